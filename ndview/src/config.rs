/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 * All rights reserved.
 *
 * This source code is licensed under the BSD-style license found in the
 * LICENSE file in the root directory of this source tree.
 */

//! Copy policy configuration.
//!
//! Most operations in this crate are pure metadata transforms. A few
//! must materialize a fresh buffer: reshaping a non-contiguous
//! tensor, [`crate::Tensor::contiguous`], concatenation, and
//! repeat/tile. [`Config`] bounds those copies.
//!
//! Values are resolved through layers, highest precedence first:
//! **TestOverride → Env → Runtime → Default**.
//!
//! - `TestOverride`: installed with [`global::override_config`];
//!   scoped to the calling thread and removed when the guard drops.
//! - `Env`: `NDVIEW_ALLOW_COPY` and `NDVIEW_MAX_COPY_ELEMENTS`, read
//!   once per process. Each variable overrides only its own field.
//! - `Runtime`: installed with [`global::set`].
//! - `Default`: [`Config::default`].

use serde::Deserialize;
use serde::Serialize;

use crate::layout::LayoutError;

/// Environment variable enabling or disabling copies.
pub const ALLOW_COPY_ENV: &str = "NDVIEW_ALLOW_COPY";

/// Environment variable bounding the size of any single copy.
pub const MAX_COPY_ELEMENTS_ENV: &str = "NDVIEW_MAX_COPY_ELEMENTS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether operations may allocate a new buffer at all. When
    /// false, any operation that would copy fails with
    /// [`LayoutError::CopyDisallowed`].
    pub allow_copy: bool,
    /// Upper bound on the number of elements in a single copy.
    pub max_copy_elements: Option<usize>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            allow_copy: true,
            max_copy_elements: None,
        }
    }
}

impl Config {
    /// Check that a copy of `elements` elements is permitted. Called
    /// before any allocation.
    pub fn check_copy(&self, elements: usize) -> Result<(), LayoutError> {
        if !self.allow_copy {
            return Err(LayoutError::CopyDisallowed { elements });
        }
        match self.max_copy_elements {
            Some(limit) if elements > limit => Err(LayoutError::CopyTooLarge { elements, limit }),
            _ => Ok(()),
        }
    }
}

/// Per-key values read from the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct EnvLayer {
    allow_copy: Option<bool>,
    max_copy_elements: Option<usize>,
}

impl EnvLayer {
    fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let allow_copy = lookup(ALLOW_COPY_ENV).and_then(|value| {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => Some(true),
                "0" | "false" | "no" | "off" => Some(false),
                _ => {
                    tracing::warn!(
                        key = ALLOW_COPY_ENV,
                        value = %value,
                        "ignoring invalid boolean configuration value"
                    );
                    None
                }
            }
        });
        let max_copy_elements =
            lookup(MAX_COPY_ELEMENTS_ENV).and_then(|value| match value.trim().parse() {
                Ok(limit) => Some(limit),
                Err(err) => {
                    tracing::warn!(
                        key = MAX_COPY_ELEMENTS_ENV,
                        value = %value,
                        error = %err,
                        "ignoring invalid integer configuration value"
                    );
                    None
                }
            });
        Self {
            allow_copy,
            max_copy_elements,
        }
    }

    fn apply(&self, mut config: Config) -> Config {
        if let Some(allow_copy) = self.allow_copy {
            config.allow_copy = allow_copy;
        }
        if self.max_copy_elements.is_some() {
            config.max_copy_elements = self.max_copy_elements;
        }
        config
    }
}

/// The process-wide configuration store.
pub mod global {
    use std::cell::RefCell;
    use std::marker::PhantomData;
    use std::sync::LazyLock;

    use parking_lot::RwLock;

    use super::Config;
    use super::EnvLayer;

    static ENV: LazyLock<EnvLayer> = LazyLock::new(EnvLayer::from_env);

    static RUNTIME: RwLock<Option<Config>> = parking_lot::const_rwlock(None);

    thread_local! {
        static TEST_OVERRIDE: RefCell<Option<Config>> = const { RefCell::new(None) };
    }

    /// The effective configuration for the calling thread.
    pub fn get() -> Config {
        if let Some(config) = TEST_OVERRIDE.with(|o| o.borrow().clone()) {
            return config;
        }
        let base = RUNTIME.read().clone().unwrap_or_default();
        ENV.apply(base)
    }

    /// Install `config` as the runtime layer for the whole process.
    pub fn set(config: Config) {
        tracing::debug!(?config, "setting runtime configuration");
        *RUNTIME.write() = Some(config);
    }

    /// Remove the runtime layer.
    pub fn reset() {
        *RUNTIME.write() = None;
    }

    /// Override the configuration on the calling thread until the
    /// returned guard drops. Overrides nest.
    ///
    /// ```
    /// use ndview::config::Config;
    /// use ndview::config::global;
    ///
    /// let _guard = global::override_config(Config {
    ///     allow_copy: false,
    ///     ..Config::default()
    /// });
    /// assert!(!global::get().allow_copy);
    /// ```
    #[must_use = "the override is removed when the guard drops"]
    pub fn override_config(config: Config) -> ConfigOverride {
        let prev = TEST_OVERRIDE.with(|o| o.borrow_mut().replace(config));
        ConfigOverride {
            prev,
            _not_send: PhantomData,
        }
    }

    /// Restores the previous override on drop.
    pub struct ConfigOverride {
        prev: Option<Config>,
        // The override lives in a thread-local.
        _not_send: PhantomData<*const ()>,
    }

    impl Drop for ConfigOverride {
        fn drop(&mut self) {
            let prev = self.prev.take();
            TEST_OVERRIDE.with(|o| *o.borrow_mut() = prev);
        }
    }
}
