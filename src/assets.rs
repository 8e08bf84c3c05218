//! Static files shipped inside the binary and written next to the built
//! versions.

/// A bundled file: the name it is written under and its contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Asset {
    pub name: &'static str,
    pub contents: &'static str,
}

/// Client-side switcher. The version manifest is appended to this file.
pub const SWITCHER_SCRIPT: Asset = Asset {
    name: "versioned_sphinx.js",
    contents: include_str!("../static/versioned_sphinx.js"),
};

pub const ALABASTER_CSS: Asset = Asset {
    name: "alabaster.css",
    contents: include_str!("../static/themes/alabaster.css"),
};

pub const RTD_CSS: Asset = Asset {
    name: "sphinx_rtd_theme.css",
    contents: include_str!("../static/themes/sphinx_rtd_theme.css"),
};

pub const FURO_CSS: Asset = Asset {
    name: "furo.css",
    contents: include_str!("../static/themes/furo.css"),
};

pub const PYDATA_CSS: Asset = Asset {
    name: "pydata_sphinx_theme.css",
    contents: include_str!("../static/themes/pydata_sphinx_theme.css"),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_switcher_reads_manifest_globals() {
        for global in ["FILES_PER_VERSION", "THEME_INJECT_POINT", "VERSIONS"] {
            assert!(SWITCHER_SCRIPT.contents.contains(global), "missing {}", global);
        }
    }

    #[test]
    fn test_stylesheets_target_switcher_class() {
        for asset in [ALABASTER_CSS, RTD_CSS, FURO_CSS, PYDATA_CSS] {
            assert!(asset.name.ends_with(".css"));
            assert!(asset.contents.contains(".versioned-sphinx-switcher"));
        }
    }
}
