/// Settings for the archive & filesystem probe (C1). The spec leaves archive
/// size/entry bounds deployment-tunable (DESIGN.md open question #3); `None`
/// means unbounded.
#[derive(Debug, Clone, Default)]
pub struct ArchiveConfig {
    pub max_entries: Option<u64>,
    pub max_uncompressed_bytes: Option<u64>,
}
