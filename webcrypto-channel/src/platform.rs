//! Host platform description for `getPlatformVersion`.

/// `"<os> <arch>"`, e.g. `"linux x86_64"`.
pub fn platform_version() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_version_shape() {
        let version = platform_version();
        let (os, arch) = version.split_once(' ').unwrap();
        assert_eq!(os, std::env::consts::OS);
        assert_eq!(arch, std::env::consts::ARCH);
    }
}
