//! Engine factory
//!
//! Name → constructor registry over the engine variants. Availability is
//! discovered by attempting construction — an engine that cannot open its
//! backend fails to build, and the factory falls through the priority
//! order until one succeeds.

use crate::error::{Error, Result};
use crate::playback::cpal_engine::CpalEngine;
use crate::playback::engine::AudioEngine;
use crate::playback::rodio_engine::RodioEngine;
use crate::playback::state::EngineCapabilities;
use tracing::{debug, info, warn};

type EngineCtor = fn() -> Result<Box<dyn AudioEngine>>;

/// Fallback order when a requested backend cannot be constructed
pub const PRIORITY_ORDER: &[&str] = &[CpalEngine::NAME, RodioEngine::NAME];

fn make_cpal() -> Result<Box<dyn AudioEngine>> {
    Ok(Box::new(CpalEngine::new()?))
}

fn make_rodio() -> Result<Box<dyn AudioEngine>> {
    Ok(Box::new(RodioEngine::new()?))
}

const REGISTRY: [(&str, EngineCtor); 2] = [
    (CpalEngine::NAME, make_cpal),
    (RodioEngine::NAME, make_rodio),
];

fn registry() -> &'static [(&'static str, EngineCtor)] {
    &REGISTRY
}

fn construct(name: &str) -> Option<Result<Box<dyn AudioEngine>>> {
    registry()
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, ctor)| ctor())
}

/// Creates engine instances with priority-ordered fallback.
pub struct EngineFactory;

impl EngineFactory {
    /// Create the named backend, falling back through the priority order
    /// if it cannot be constructed.
    ///
    /// # Errors
    /// `Error::NoBackend` when every registered variant fails.
    pub fn create(backend: &str) -> Result<Box<dyn AudioEngine>> {
        match construct(backend) {
            Some(Ok(engine)) => {
                info!("using audio backend: {}", backend);
                return Ok(engine);
            }
            Some(Err(e)) => {
                warn!(
                    "failed to create {} backend: {}, attempting fallback",
                    backend, e
                );
            }
            None => {
                warn!("unknown audio backend: {}, attempting fallback", backend);
            }
        }

        Self::create_best_available(&[backend])
    }

    /// Create the highest-priority backend that constructs successfully.
    pub fn create_best_available(exclude: &[&str]) -> Result<Box<dyn AudioEngine>> {
        for &backend in PRIORITY_ORDER {
            if exclude.contains(&backend) {
                continue;
            }
            match construct(backend) {
                Some(Ok(engine)) => {
                    info!("using audio backend: {}", backend);
                    return Ok(engine);
                }
                Some(Err(e)) => {
                    debug!("backend {} unavailable: {}", backend, e);
                }
                None => {}
            }
        }
        Err(Error::NoBackend)
    }

    /// Whether the named backend can currently be constructed.
    ///
    /// Construct-and-discard: no side effects on playback state.
    pub fn is_available(backend: &str) -> bool {
        match construct(backend) {
            Some(Ok(mut engine)) => {
                engine.cleanup();
                true
            }
            _ => false,
        }
    }

    /// Names of every backend that constructs, in priority order.
    pub fn available_backends() -> Vec<&'static str> {
        PRIORITY_ORDER
            .iter()
            .copied()
            .filter(|name| Self::is_available(name))
            .collect()
    }

    /// Capability flags for the named backend, or `None` when it is not
    /// constructible.
    pub fn backend_info(backend: &str) -> Option<EngineCapabilities> {
        match construct(backend) {
            Some(Ok(mut engine)) => {
                let caps = engine.capabilities();
                engine.cleanup();
                Some(caps)
            }
            _ => None,
        }
    }
}
