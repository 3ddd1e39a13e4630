//! Environment source: MIRRORFS__SECTION__KEY, e.g. MIRRORFS__OBSERVER__ENABLED=false

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("MIRRORFS")
            .prefix_separator("__")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("observer.ignore_suffixes")
            .try_parsing(true),
    )
}
