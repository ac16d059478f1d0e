use rhai::module_resolvers::DummyModuleResolver;
use rhai::Engine;

use crate::config::{Capabilities, SandboxConfig};

/// Symbols that are never available to playground scripts.
const DISABLED_SYMBOLS: &[&str] = &["eval"];

/// Creates a Rhai engine with the sandbox limits applied.
///
/// The returned engine has no host functions registered; per-run I/O is wired
/// up by the sandbox on a fresh engine for every execution.
pub fn create_engine(config: &SandboxConfig, caps: Capabilities) -> Engine {
    let mut engine = Engine::new();

    // Apply security limits
    engine.set_max_operations(config.max_operations);
    engine.set_max_call_levels(config.max_call_levels);
    engine.set_max_string_size(config.max_string_size);
    engine.set_max_array_size(config.max_array_size);
    engine.set_max_map_size(config.max_array_size);

    for &symbol in DISABLED_SYMBOLS {
        engine.disable_symbol(symbol);
    }

    // Module imports read from disk
    if !caps.allow_file_read {
        engine.set_module_resolver(DummyModuleResolver::new());
    }

    engine.on_debug(|text, source, pos| {
        log::debug!("script debug [{}] {:?}: {}", source.unwrap_or("main"), pos, text);
    });

    engine
}
