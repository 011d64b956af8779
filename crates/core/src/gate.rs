use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    Built,
    NeedsBuild,
}

/// Decides whether a build is needed. Only existence is checked; contents are not inspected.
pub fn check_store(path: &Path) -> StoreStatus {
    if path.exists() {
        StoreStatus::Built
    } else {
        StoreStatus::NeedsBuild
    }
}
