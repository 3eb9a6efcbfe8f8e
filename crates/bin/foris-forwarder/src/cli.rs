use std::path::PathBuf;

/// `foris-forwarder` bridges a bounded set of foris-controller MQTT topics
/// between the local bus and each configured subordinate.
#[derive(Debug, clap::Parser)]
#[command(name = "foris-forwarder", version)]
pub struct Cli {
    /// Enable debug-level logging.
    #[arg(short, long)]
    pub debug: bool,

    /// The local foris-controller's 16-hex controller id.
    #[arg(long)]
    pub controller_id: String,

    /// Port of the local (host) broker.
    #[arg(long, default_value_t = 1883)]
    pub port: u16,

    /// Path to a file whose first line is `<username>:<password>`, used to
    /// authenticate against the host broker.
    #[arg(long)]
    pub passwd_file: PathBuf,

    /// Path to the directory holding the `fosquitto` configuration document
    /// (standing in for the opaque UCI store's `fosquitto` package).
    #[arg(long, default_value = "/etc/config")]
    pub uci_config_dir: PathBuf,

    /// Path to the directory holding each subordinate's certificate material.
    #[arg(long, default_value = "/etc/fosquitto/bridges")]
    pub fosquitto_dir: PathBuf,
}

/// Parse a credentials file's first line as `<username>:<password>`.
pub fn read_passwd_file(path: &std::path::Path) -> anyhow::Result<(String, String)> {
    let contents = std::fs::read_to_string(path)
        .map_err(|error| anyhow::anyhow!("failed to read passwd file {path:?}: {error}"))?;
    let first_line = contents
        .lines()
        .next()
        .ok_or_else(|| anyhow::anyhow!("passwd file {path:?} is empty"))?;
    let (username, password) = first_line
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("passwd file {path:?} is not formatted as '<username>:<password>'"))?;
    Ok((username.to_string(), password.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_username_and_password_from_first_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "alice:s3cret").unwrap();

        let (username, password) = read_passwd_file(file.path()).unwrap();
        assert_eq!(username, "alice");
        assert_eq!(password, "s3cret");
    }

    #[test]
    fn rejects_a_line_with_no_colon() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "no-colon-here").unwrap();

        assert!(read_passwd_file(file.path()).is_err());
    }
}
