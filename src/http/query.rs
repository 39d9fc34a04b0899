//! Query string flags

/// Which view of an item a GET asks for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryFlags {
    pub children: bool,
    pub download: bool,
}

impl QueryFlags {
    /// Parse flags from a raw query string (without the leading `?`)
    ///
    /// A flag counts when its key is present, whatever the value.
    ///
    /// # Examples
    /// ```
    /// use fsapi::http::query::QueryFlags;
    /// assert!(QueryFlags::parse(Some("children")).children);
    /// assert!(QueryFlags::parse(Some("x=1&download=")).download);
    /// assert_eq!(QueryFlags::parse(None), QueryFlags::default());
    /// ```
    pub fn parse(query: Option<&str>) -> Self {
        let mut flags = Self::default();
        let Some(query) = query else {
            return flags;
        };
        for (key, _) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "children" => flags.children = true,
                "download" => flags.download = true,
                _ => {}
            }
        }
        flags
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_by_presence() {
        let flags = QueryFlags::parse(Some("children=1&download"));
        assert!(flags.children);
        assert!(flags.download);
    }

    #[test]
    fn test_unrelated_keys_ignored() {
        let flags = QueryFlags::parse(Some("child=1&downloads"));
        assert!(!flags.children);
        assert!(!flags.download);
        assert_eq!(QueryFlags::parse(Some("")), QueryFlags::default());
    }
}
