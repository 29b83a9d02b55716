//! Translation of client-side POSIX paths to host-side Windows paths.
//!
//! Clients live in a Unix subsystem where host drives are mounted under
//! `/mnt/<drive>`. File-upload arguments arrive in that form and must reach
//! `DOM.setFileInputFiles` as native paths. Anything that does not match the
//! mount pattern passes through untouched.

/// `/mnt/c/temp/x.txt` → `C:\temp\x.txt`; everything else unchanged.
pub fn translate_client_path(path: &str) -> String {
    let Some(rest) = path.strip_prefix("/mnt/") else {
        return path.to_string();
    };
    let (drive, remainder) = match rest.split_once('/') {
        Some((drive, remainder)) => (drive, remainder),
        None => (rest, ""),
    };
    if drive.len() != 1 || !drive.chars().all(|c| c.is_ascii_alphabetic()) {
        return path.to_string();
    }
    let drive = drive.to_ascii_uppercase();
    if remainder.is_empty() {
        format!("{drive}:\\")
    } else {
        format!("{drive}:\\{}", remainder.replace('/', "\\"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mounted_drive_paths_are_translated() {
        assert_eq!(translate_client_path("/mnt/c/temp/x.txt"), "C:\\temp\\x.txt");
        assert_eq!(
            translate_client_path("/mnt/d/Users/dev/upload file.bin"),
            "D:\\Users\\dev\\upload file.bin"
        );
        assert_eq!(translate_client_path("/mnt/c"), "C:\\");
        assert_eq!(translate_client_path("/mnt/c/"), "C:\\");
    }

    #[test]
    fn non_mount_paths_pass_through() {
        assert_eq!(translate_client_path("/tmp/x.txt"), "/tmp/x.txt");
        assert_eq!(translate_client_path("relative/file.txt"), "relative/file.txt");
        assert_eq!(translate_client_path("C:\\already\\native"), "C:\\already\\native");
    }

    #[test]
    fn multi_letter_mounts_are_not_drives() {
        assert_eq!(
            translate_client_path("/mnt/wsl/something"),
            "/mnt/wsl/something"
        );
    }
}
