// SPDX-License-Identifier: AGPL-3.0-or-later
#![no_main]

use libfuzzer_sys::fuzz_target;
use miniml_core::{parse, OutputFormat, RenderConfig, RendererRegistry, WidgetSet};

fuzz_target!(|data: &[u8]| {
    let Ok(source) = std::str::from_utf8(data) else {
        return;
    };

    let widgets = WidgetSet {
        properties: true,
        ..Default::default()
    };
    let Ok(root) = parse(source, &widgets.registry()) else {
        return;
    };

    let registry = RendererRegistry::with_defaults();
    let config = RenderConfig {
        allow_properties: true,
        allowed_components: vec!["RouterLink".to_string()],
        ..Default::default()
    };
    for format in OutputFormat::ALL {
        let _ = registry.render(&root, format, &config);
    }
});
