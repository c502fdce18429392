//! Ambient dependencies threaded through every engine call.
//!
//! The engine itself only needs a clock and an id generator. Everything a
//! concrete flow talks to (identity store, OTP sender, rate limiter, event
//! sink) is registered as a typed extension by the surrounding application
//! and fetched back by type inside effects and edge instantiation. None of
//! this is ever stored in the workflow document.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::SystemTime;

use crate::ids::IdGenerator;

pub trait Clock: Send + Sync {
    fn now(&self) -> SystemTime;
}

/// Wall clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

pub struct Dependencies {
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    /// Remote address of the request driving this cycle, when known.
    pub remote_ip: Option<IpAddr>,
    extensions: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl Dependencies {
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            clock,
            ids,
            remote_ip: None,
            extensions: HashMap::new(),
        }
    }

    #[must_use]
    pub fn with_remote_ip(mut self, remote_ip: IpAddr) -> Self {
        self.remote_ip = Some(remote_ip);
        self
    }

    /// Register a collaborator handle. Replaces any previous handle of the
    /// same type.
    pub fn insert<T>(&mut self, value: T)
    where
        T: Send + Sync + 'static,
    {
        self.extensions.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// Fetch a collaborator handle by type.
    #[must_use]
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Send + Sync + 'static,
    {
        self.extensions
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|any| any.downcast::<T>().ok())
    }
}
