//! Environment source: MAILWEAVE__SECTION__KEY overrides, e.g. MAILWEAVE__GENERATION__SEED=7

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("MAILWEAVE")
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true),
    )
}
