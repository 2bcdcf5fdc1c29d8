use once_cell::sync::Lazy;
use std::collections::HashMap;

/// A runtime module and the package prefixes it exports.
#[derive(Debug, Clone, Copy)]
struct RuntimeModule {
    name: &'static str,
    packages: &'static [&'static str],
}

/// Packages shipped with the Java runtime, keyed by their defining module.
///
/// Classes in these packages are always present at run time and are never
/// shadowed by classpath archives, so references into them resolve without
/// inspection. The table covers the modules real-world libraries link
/// against; anything under the reserved `jdk`/`sun` trees is caught by the
/// prefix fallback below.
const RUNTIME_MODULES: &[RuntimeModule] = &[
    RuntimeModule {
        name: "java.base",
        packages: &[
            "java/io",
            "java/lang",
            "java/math",
            "java/net",
            "java/nio",
            "java/security",
            "java/text",
            "java/time",
            "java/util",
            "javax/crypto",
            "javax/net",
            "javax/security",
        ],
    },
    RuntimeModule {
        name: "java.logging",
        packages: &["java/util/logging"],
    },
    RuntimeModule {
        name: "java.sql",
        packages: &["java/sql", "javax/sql"],
    },
    RuntimeModule {
        name: "java.xml",
        packages: &["javax/xml", "org/w3c/dom", "org/xml/sax"],
    },
    RuntimeModule {
        name: "java.desktop",
        packages: &["java/applet", "java/awt", "javax/imageio", "javax/sound", "javax/swing"],
    },
    RuntimeModule {
        name: "java.naming",
        packages: &["javax/naming"],
    },
    RuntimeModule {
        name: "java.management",
        packages: &["java/lang/management", "javax/management"],
    },
    RuntimeModule {
        name: "java.rmi",
        packages: &["java/rmi", "javax/rmi/ssl"],
    },
    RuntimeModule {
        name: "java.scripting",
        packages: &["javax/script"],
    },
    RuntimeModule {
        name: "java.compiler",
        packages: &["javax/annotation/processing", "javax/lang/model", "javax/tools"],
    },
    RuntimeModule {
        name: "java.instrument",
        packages: &["java/lang/instrument"],
    },
    RuntimeModule {
        name: "java.datatransfer",
        packages: &["java/awt/datatransfer"],
    },
];

const RUNTIME_PREFIX_FALLBACK: &[&str] = &["jdk/", "sun/", "com/sun/"];

static PACKAGE_TO_MODULE: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for module in RUNTIME_MODULES {
        for package in module.packages {
            map.insert(*package, module.name);
        }
    }
    map
});

/// The defining runtime module of `internal_name`, if it is a runtime
/// class. Longest-package match, so `java/util/logging/Logger` reports
/// `java.logging` rather than `java.base`.
pub fn runtime_module_of(internal_name: &str) -> Option<&'static str> {
    let mut package = match internal_name.rsplit_once('/') {
        Some((package, _)) => package,
        None => return None,
    };

    loop {
        if let Some(module) = PACKAGE_TO_MODULE.get(package) {
            return Some(module);
        }
        match package.rsplit_once('/') {
            Some((parent, _)) => package = parent,
            None => break,
        }
    }

    if RUNTIME_PREFIX_FALLBACK
        .iter()
        .any(|prefix| internal_name.starts_with(prefix))
    {
        return Some("jdk.internal");
    }

    None
}

/// Whether `internal_name` is shipped with the runtime.
pub fn is_runtime_class(internal_name: &str) -> bool {
    runtime_module_of(internal_name).is_some()
}
