/// Identifies a database product and version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Product {
    /// Product name, e.g. `PostgreSQL`
    pub name: String,

    /// Name of the driver used to talk to the product
    pub driver: String,

    pub major: u32,
    pub minor: u32,
    pub release: u32,
}

impl Product {
    pub fn new(name: impl Into<String>, driver: impl Into<String>) -> Product {
        Product {
            name: name.into(),
            driver: driver.into(),
            ..Product::default()
        }
    }

    pub fn with_version(mut self, major: u32, minor: u32) -> Product {
        self.major = major;
        self.minor = minor;
        self
    }

    pub fn with_release(mut self, release: u32) -> Product {
        self.release = release;
        self
    }

    /// Registry key of the product.
    pub fn key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Returns `true` when `(major, minor)` is at or below this product's
    /// version.
    pub fn satisfies(&self, major: u32, minor: u32) -> bool {
        (major, minor) <= (self.major, self.minor)
    }

    /// Returns `true` when `driver_name` refers to this product, matching on
    /// the driver or product name.
    pub fn matches_driver(&self, driver_name: &str) -> bool {
        let driver_name = driver_name.to_lowercase();
        (!self.driver.is_empty() && driver_name.contains(&self.driver.to_lowercase()))
            || (!self.name.is_empty() && driver_name.contains(&self.key()))
    }

    /// Copies the version numbers parsed out of a version banner.
    pub fn merge_version(&mut self, parsed: &Product) {
        self.major = parsed.major;
        self.minor = parsed.minor;
        self.release = parsed.release;
    }
}

impl core::fmt::Display for Product {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}v{}", self.name, self.major)
    }
}

/// Parses a version banner as returned by the product's version query.
///
/// Leading text up to the first digit is the product name (with a trailing
/// `v` marker removed). The first run of digits is the major version, followed
/// by optional `.` or `-` separated minor and release numbers. A banner without
/// any digit yields a zero-valued product.
pub fn parse_version(banner: &str) -> Product {
    let Some(start) = banner.find(|c: char| c.is_ascii_digit()) else {
        return Product::default();
    };

    let mut name = banner[..start].trim_end();
    if let Some(stripped) = name.strip_suffix(['v', 'V']) {
        if stripped.is_empty() || stripped.ends_with(char::is_whitespace) {
            name = stripped.trim_end();
        }
    }

    let mut numbers = [0u32; 3];
    let mut rest = &banner[start..];

    for (i, number) in numbers.iter_mut().enumerate() {
        if i > 0 {
            match rest.strip_prefix(['.', '-']) {
                Some(next) if next.starts_with(|c: char| c.is_ascii_digit()) => rest = next,
                _ => break,
            }
        }

        let end = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        *number = rest[..end].parse().unwrap_or(0);
        rest = &rest[end..];
    }

    Product {
        name: name.trim().to_string(),
        driver: String::new(),
        major: numbers[0],
        minor: numbers[1],
        release: numbers[2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn version(name: &str, major: u32, minor: u32, release: u32) -> Product {
        Product::new(name, "")
            .with_version(major, minor)
            .with_release(release)
    }

    #[test]
    fn postgres_banner() {
        assert_eq!(
            parse_version(
                "PostgreSQL 9.3.10 on x86_64-unknown-linux-gnu, compiled by gcc (Ubuntu 4.8.2-19ubuntu1) 4.8.2, 64-bit"
            ),
            version("PostgreSQL", 9, 3, 10)
        );
    }

    #[test]
    fn bare_mysql_version() {
        assert_eq!(parse_version("5.6.14-log"), version("", 5, 6, 14));
    }

    #[test]
    fn vertica_banner() {
        assert_eq!(
            parse_version("Vertica Analytic Database v9.1.0-2"),
            version("Vertica Analytic Database", 9, 1, 0)
        );
    }

    #[test]
    fn dash_separated() {
        assert_eq!(parse_version("8-0"), version("", 8, 0, 0));
    }

    #[test]
    fn no_digits() {
        assert_eq!(parse_version("unknown"), Product::default());
    }

    #[test]
    fn name_ending_in_v_is_kept() {
        assert_eq!(parse_version("Dev 2.1").name, "Dev");
        assert_eq!(parse_version("Rev2.1").name, "Rev");
    }

    #[test]
    fn driver_matching() {
        let sqlite = Product::new("SQLite", "sqlite3");
        assert!(sqlite.matches_driver("sqlite3"));
        assert!(sqlite.matches_driver("rusqlite::SQLite"));
        assert!(!sqlite.matches_driver("postgres"));
    }
}
