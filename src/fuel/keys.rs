//! Local storage for private keys fetched from the Fuel master.

use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::ambient_authority;
use cap_std::fs::{DirBuilder, DirBuilderExt, OpenOptions, OpenOptionsExt, PermissionsExt};
use cap_std::fs_utf8::Dir;

use super::FuelError;

/// Remote key files read from the master, in the order they are offered.
pub const ADMIN_KEY_PATHS: [&str; 2] = ["/root/.ssh/id_rsa", "/root/.ssh/bootstrap.rsa"];

const KEY_DIR_MODE: u32 = 0o700;
const KEY_FILE_MODE: u32 = 0o600;
const GROUP_OTHER_BITS: u32 = 0o077;

/// Writes each `(file name, contents)` pair into `dir` and returns the
/// resulting paths in input order.
///
/// A missing `dir` is created with mode 0700. An existing one is only used
/// when neither group nor others can access it. Key files are created with
/// mode 0600.
///
/// # Errors
///
/// Returns [`FuelError::KeyStore`] when the directory cannot be created, is
/// accessible to other users, or a key cannot be written.
pub fn store_keys(dir: &Utf8Path, keys: &[(&str, String)]) -> Result<Vec<Utf8PathBuf>, FuelError> {
    let store_error = |path: &Utf8Path, err: &io::Error| FuelError::KeyStore {
        path: path.to_path_buf(),
        message: err.to_string(),
    };
    let handle = open_private_dir(dir).map_err(|err| store_error(dir, &err))?;

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true).mode(KEY_FILE_MODE);
    let mut stored = Vec::with_capacity(keys.len());
    for (name, contents) in keys {
        let path = dir.join(name);
        write_key(&handle, name, &options, contents).map_err(|err| store_error(&path, &err))?;
        stored.push(path);
    }
    Ok(stored)
}

fn open_private_dir(dir: &Utf8Path) -> io::Result<Dir> {
    let (parent_path, name) = match (dir.parent(), dir.file_name()) {
        (Some(parent), Some(name)) => (
            if parent.as_str().is_empty() { Utf8Path::new(".") } else { parent },
            name,
        ),
        _ => return Dir::open_ambient_dir(dir, ambient_authority()).and_then(check_private),
    };
    Dir::create_ambient_dir_all(parent_path, ambient_authority())?;
    let parent = Dir::open_ambient_dir(parent_path, ambient_authority())?;
    let mut builder = DirBuilder::new();
    builder.mode(KEY_DIR_MODE);
    parent
        .create_dir_with(name, &builder)
        .or_else(|err| if err.kind() == io::ErrorKind::AlreadyExists { Ok(()) } else { Err(err) })?;
    parent.open_dir(name).and_then(check_private)
}

fn check_private(handle: Dir) -> io::Result<Dir> {
    let mode = handle.dir_metadata()?.permissions().mode();
    if mode & GROUP_OTHER_BITS == 0 {
        Ok(handle)
    } else {
        Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("key directory is accessible to other users (mode {:o})", mode & 0o777),
        ))
    }
}

fn write_key(handle: &Dir, name: &str, options: &OpenOptions, contents: &str) -> io::Result<()> {
    let mut file = handle.open_with(name, options)?;
    // A key left over from an earlier run keeps its old mode on open.
    file.set_permissions(cap_std::fs::Permissions::from_mode(KEY_FILE_MODE))?;
    file.write_all(contents.as_bytes())
}

/// File name used locally for a remote key path.
#[must_use]
pub fn local_key_name(remote_path: &str) -> &str {
    remote_path.rsplit('/').next().unwrap_or(remote_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::{MetadataExt, PermissionsExt as _};
    use tempfile::TempDir;

    fn utf8_root(tmp: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(tmp.path().join(name))
            .unwrap_or_else(|path| panic!("non utf8 path: {}", path.display()))
    }

    #[test]
    fn keys_are_written_private_and_in_order() {
        let tmp = TempDir::new().expect("temp dir");
        let root = utf8_root(&tmp, "keys");

        let stored = store_keys(
            &root,
            &[
                ("id_rsa", String::from("first\n")),
                ("bootstrap.rsa", String::from("second\n")),
            ],
        )
        .expect("keys should be stored");

        assert_eq!(stored, vec![root.join("id_rsa"), root.join("bootstrap.rsa")]);
        for path in &stored {
            let metadata = std::fs::metadata(path).expect("key metadata");
            assert_eq!(metadata.mode() & 0o777, 0o600, "{path}");
        }
        let first = std::fs::read_to_string(root.join("id_rsa")).expect("read key");
        assert_eq!(first, "first\n");
        let dir_mode = std::fs::metadata(&root).expect("dir metadata").mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn shared_key_directory_is_refused() {
        let tmp = TempDir::new().expect("temp dir");
        let root = utf8_root(&tmp, "shared");
        std::fs::create_dir(&root).expect("create dir");
        std::fs::set_permissions(&root, std::fs::Permissions::from_mode(0o777))
            .expect("open up dir");

        let err = store_keys(&root, &[("id_rsa", String::from("secret\n"))])
            .expect_err("shared dir must be refused");

        assert!(matches!(err, FuelError::KeyStore { ref path, .. } if *path == root));
        assert!(!root.join("id_rsa").exists());
    }

    #[test]
    fn stale_readable_key_is_tightened_and_replaced() {
        let tmp = TempDir::new().expect("temp dir");
        let root = utf8_root(&tmp, "keys");
        store_keys(&root, &[("id_rsa", String::from("a much longer old key\n"))])
            .expect("first store");
        std::fs::set_permissions(root.join("id_rsa"), std::fs::Permissions::from_mode(0o644))
            .expect("loosen key");

        store_keys(&root, &[("id_rsa", String::from("new\n"))]).expect("second store");

        let metadata = std::fs::metadata(root.join("id_rsa")).expect("key metadata");
        assert_eq!(metadata.mode() & 0o777, 0o600);
        let contents = std::fs::read_to_string(root.join("id_rsa")).expect("read key");
        assert_eq!(contents, "new\n");
    }

    #[test]
    fn local_names_drop_directories() {
        assert_eq!(local_key_name("/root/.ssh/bootstrap.rsa"), "bootstrap.rsa");
        assert_eq!(local_key_name("id_rsa"), "id_rsa");
    }
}
