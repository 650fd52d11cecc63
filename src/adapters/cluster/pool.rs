use std::sync::Arc;

use crate::{Error, Result};

/// The ordered, fixed set of backends a cluster routes over.
///
/// Built once and never resized. Index 0 is the master under
/// [`Schedule::MasterSlave`](super::Schedule::MasterSlave) and the backend
/// whose result a fan-out write returns. Backends are shared handles so a
/// write can outlive the call that started it.
#[derive(Debug)]
pub struct BackendPool<B> {
    backends: Vec<Arc<B>>,
}

impl<B> BackendPool<B> {
    /// Wrap pre-built backend handles, keeping their order.
    pub fn new(backends: Vec<B>) -> Result<Self> {
        if backends.is_empty() {
            return Err(Error::Config("cluster requires at least one backend".to_string()));
        }
        Ok(Self {
            backends: backends.into_iter().map(Arc::new).collect(),
        })
    }

    /// Build one backend per configuration, in order. The first failing
    /// constructor aborts the whole pool.
    pub fn connect<C, F>(configs: Vec<C>, connect: F) -> Result<Self>
    where
        F: FnMut(C) -> Result<B>,
    {
        Self::new(connect_all(configs, connect)?)
    }

    /// Number of backends. Never zero.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&B> {
        self.backends.get(index).map(Arc::as_ref)
    }

    /// Index a backend the scheduler picked. Scheduler indices are always in range.
    pub(crate) fn at(&self, index: usize) -> &B {
        &self.backends[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &B> + '_ {
        self.backends.iter().map(Arc::as_ref)
    }

    /// Owned handles, for work that must not borrow the pool.
    pub(crate) fn handles(&self) -> impl Iterator<Item = Arc<B>> + '_ {
        self.backends.iter().cloned()
    }
}

pub(crate) fn connect_all<B, C, F>(configs: Vec<C>, mut connect: F) -> Result<Vec<B>>
where
    F: FnMut(C) -> Result<B>,
{
    configs
        .into_iter()
        .enumerate()
        .map(|(idx, config)| {
            connect(config).inspect_err(|e| {
                tracing::error!(backend_index = idx, error = ?e, "Backend construction failed");
            })
        })
        .collect()
}
