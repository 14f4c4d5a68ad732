//! Database backup through `mysqldump`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::core::uri::ConnectionParams;
use crate::error::{DbError, Result};

use super::options::as_int;

/// Default dump tool, looked up on `PATH`.
pub const DEFAULT_MYSQLDUMP: &str = "mysqldump";

/// Build the `mysqldump` argument list (without the program name).
///
/// The password is never part of the arguments; see [`run_backup`].
pub fn mysqldump_args(params: &ConnectionParams, dest: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["--no-defaults".into()];

    if let Some(host) = &params.host {
        args.extend(["-h".into(), host.into()]);
    }
    if let Some(port) = params.port {
        args.extend(["-P".into(), port.to_string().into()]);
    }
    if let Some(user) = &params.user {
        args.extend(["-u".into(), user.into()]);
    }

    for (name, value) in &params.params {
        match name.as_str() {
            "compress" => {
                if as_int(value, 0) != 0 {
                    args.push("--compress".into());
                }
            }
            "named_pipe" => {
                if as_int(value, 0) != 0 {
                    args.push("--protocol=pipe".into());
                }
            }
            // mysqldump only honors --defaults-file as its first argument
            "read_default_file" => args.insert(0, format!("--defaults-file={}", value).into()),
            "unix_socket" => {
                args.push("--protocol=socket".into());
                args.push(format!("--socket={}", value).into());
            }
            "charset" => args.push(format!("--default-character-set={}", value).into()),
            "init_command" | "read_default_group" => {}
            _ => warn!("Invalid connection string parameter '{}'", name),
        }
    }

    args.push("-r".into());
    args.push(dest.as_os_str().to_owned());
    args.push(params.database().into());
    args
}

/// Dump the database to `dest` with the given `mysqldump` executable.
///
/// The password is passed to the child in `MYSQL_PWD` only. Its stderr is
/// captured and reported if the tool fails.
pub async fn run_backup(mysqldump: &Path, params: &ConnectionParams, dest: &Path) -> Result<PathBuf> {
    let args = mysqldump_args(params, dest);
    debug!("Running {} {:?}", mysqldump.display(), args);

    let mut command = Command::new(mysqldump);
    command
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(password) = &params.password {
        command.env("MYSQL_PWD", password);
    }

    let output = command.output().await.map_err(|e| {
        DbError::external_tool(format!("Unable to run {}: {}", mysqldump.display(), e))
    })?;

    if !output.status.success() {
        return Err(DbError::external_tool(format!(
            "mysqldump failed ({}): {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    if tokio::fs::metadata(dest).await.is_err() {
        return Err(DbError::external_tool("No destination file created"));
    }

    info!("Database {} backed up to {}", params.database(), dest.display());
    Ok(dest.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ConnectionParams {
        let mut p = ConnectionParams::new("/trac");
        p.user = Some("trac".into());
        p.password = Some("s3cret".into());
        p.host = Some("db.example.com".into());
        p.port = Some(3307);
        p
    }

    fn strings(args: &[OsString]) -> Vec<String> {
        args.iter().map(|a| a.to_string_lossy().into_owned()).collect()
    }

    #[test]
    fn test_args_basic() {
        let args = strings(&mysqldump_args(&params(), Path::new("/tmp/trac.sql")));
        assert_eq!(
            args,
            vec![
                "--no-defaults",
                "-h",
                "db.example.com",
                "-P",
                "3307",
                "-u",
                "trac",
                "-r",
                "/tmp/trac.sql",
                "trac"
            ]
        );
        assert!(!args.iter().any(|a| a.contains("s3cret")));
    }

    #[test]
    fn test_args_with_params() {
        let mut p = params();
        for (k, v) in [
            ("compress", "1"),
            ("named_pipe", "0"),
            ("read_default_file", "/etc/mysql/trac.cnf"),
            ("unix_socket", "/run/mysqld.sock"),
            ("charset", "utf8mb4"),
            ("init_command", "SET x=1"),
            ("read_default_group", "trac"),
            ("bogus", "1"),
        ] {
            p.params.insert(k.into(), v.into());
        }
        let args = strings(&mysqldump_args(&p, Path::new("out.sql")));

        assert_eq!(args[0], "--defaults-file=/etc/mysql/trac.cnf");
        assert_eq!(args[1], "--no-defaults");
        assert!(args.contains(&"--compress".to_string()));
        assert!(!args.contains(&"--protocol=pipe".to_string()));
        assert!(args.contains(&"--protocol=socket".to_string()));
        assert!(args.contains(&"--socket=/run/mysqld.sock".to_string()));
        assert!(args.contains(&"--default-character-set=utf8mb4".to_string()));
        assert!(!args.iter().any(|a| a.contains("SET x=1") || a == "bogus"));
        assert_eq!(&args[args.len() - 3..], ["-r", "out.sql", "trac"]);
    }

    #[tokio::test]
    async fn test_missing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trac.sql");
        let err = run_backup(Path::new("/nonexistent/mysqldump"), &params(), &dest)
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::ExternalTool(_)));
        assert!(err.to_string().contains("Unable to run"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_tool() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trac.sql");
        let err = run_backup(Path::new("false"), &params(), &dest)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("mysqldump failed"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_no_destination_created() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("trac.sql");
        let err = run_backup(Path::new("true"), &params(), &dest)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("No destination file created"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_dump_receives_password_in_env() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let tool = dir.path().join("fake-mysqldump");
        std::fs::write(
            &tool,
            "#!/bin/sh\n\
             [ \"$MYSQL_PWD\" = \"s3cret\" ] || { echo 'no password' >&2; exit 3; }\n\
             while [ $# -gt 0 ]; do\n\
             if [ \"$1\" = \"-r\" ]; then shift; echo '-- dump' > \"$1\"; fi\n\
             shift\n\
             done\n",
        )
        .unwrap();
        std::fs::set_permissions(&tool, std::fs::Permissions::from_mode(0o755)).unwrap();

        let dest = dir.path().join("trac.sql");
        let written = run_backup(&tool, &params(), &dest).await.unwrap();
        assert_eq!(written, dest);
        assert!(dest.exists());

        let mut no_password = params();
        no_password.password = None;
        let err = run_backup(&tool, &no_password, &dir.path().join("other.sql"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no password"));
    }
}
