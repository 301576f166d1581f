/*!
 * Enumerator filters: size bounds, hidden-file exclusion, empty-file
 * exclusion. Unlike the ambient stack's original glob/regex include-exclude
 * filters, twinsweep's filter set is the small, fixed one the spec defines.
 */

#[derive(Debug, Clone, Copy, Default)]
pub struct FilterSet {
    pub min_size: Option<u64>,
    pub max_size: Option<u64>,
    pub exclude_empty: bool,
    pub exclude_hidden: bool,
    pub follow_symlinks: bool,
}

impl FilterSet {
    pub fn size_in_bounds(&self, size: u64) -> bool {
        if let Some(min) = self.min_size {
            if size < min {
                return false;
            }
        }
        if let Some(max) = self.max_size {
            if size > max {
                return false;
            }
        }
        if self.exclude_empty && size == 0 {
            return false;
        }
        true
    }

    pub fn is_hidden(name: &std::ffi::OsStr) -> bool {
        name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
    }

    pub fn should_skip_hidden(&self, name: &std::ffi::OsStr) -> bool {
        self.exclude_hidden && Self::is_hidden(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    #[test]
    fn test_size_bounds() {
        let filters = FilterSet {
            min_size: Some(10),
            max_size: Some(100),
            ..Default::default()
        };
        assert!(!filters.size_in_bounds(5));
        assert!(filters.size_in_bounds(50));
        assert!(!filters.size_in_bounds(200));
    }

    #[test]
    fn test_exclude_empty() {
        let filters = FilterSet {
            exclude_empty: true,
            ..Default::default()
        };
        assert!(!filters.size_in_bounds(0));
        assert!(filters.size_in_bounds(1));
    }

    #[test]
    fn test_hidden_detection() {
        assert!(FilterSet::is_hidden(OsStr::new(".bashrc")));
        assert!(!FilterSet::is_hidden(OsStr::new("bashrc")));
    }

    #[test]
    fn test_should_skip_hidden_respects_flag() {
        let off = FilterSet::default();
        let on = FilterSet {
            exclude_hidden: true,
            ..Default::default()
        };
        assert!(!off.should_skip_hidden(OsStr::new(".git")));
        assert!(on.should_skip_hidden(OsStr::new(".git")));
        assert!(!on.should_skip_hidden(OsStr::new("git")));
    }
}
