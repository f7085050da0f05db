//! Parsers for the text printed by remote inspection commands.
//!
//! Parsing is best-effort: lines that do not have the expected shape are
//! skipped rather than rejected, and the number of skipped lines is reported
//! alongside the result so callers can log it.

/// Partition type id for Linux native filesystems.
pub const PARTITION_LINUX: u32 = 0x83;
/// Partition type id for Linux swap.
pub const PARTITION_LINUX_SWAP: u32 = 0x82;
/// Partition type id for Linux LVM physical volumes.
pub const PARTITION_LINUX_LVM: u32 = 0x8e;
/// Partition type id for Linux software RAID members.
pub const PARTITION_LINUX_RAID: u32 = 0xfd;
/// Partition type id for DOS extended partitions.
pub const PARTITION_EXTENDED: u32 = 0x05;

/// Keys that carry the partition type id in `sfdisk -d` output. Older
/// releases print `Id=83`, newer ones `type=83`.
const TYPE_KEYS: [&str; 2] = ["Id=", "type="];

/// Result of a best-effort parse.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct ParseReport<T> {
    /// Parsed value.
    pub value: T,
    /// Non-blank lines that did not match the expected shape.
    pub skipped_lines: usize,
}

/// Partition type ids keyed by device path, in the order `sfdisk` listed
/// them.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct PartitionTable {
    entries: Vec<(String, u32)>,
}

impl PartitionTable {
    /// Type id of `device`, if it was listed.
    #[must_use]
    pub fn get(&self, device: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|(path, _)| path == device)
            .map(|&(_, id)| id)
    }

    /// Number of partitions listed.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no partitions were listed.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(device, type id)` pairs in scan order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
        self.entries.iter().map(|(path, id)| (path.as_str(), *id))
    }

    /// Devices whose type id equals `type_id`, in scan order.
    pub fn devices_of_type(&self, type_id: u32) -> impl Iterator<Item = &str> {
        self.iter()
            .filter(move |&(_, id)| id == type_id)
            .map(|(path, _)| path)
    }

    fn insert(&mut self, device: &str, type_id: u32) {
        if let Some(entry) = self.entries.iter_mut().find(|(path, _)| path == device) {
            entry.1 = type_id;
        } else {
            self.entries.push((device.to_owned(), type_id));
        }
    }
}

/// Parses `sfdisk -d` output into a [`PartitionTable`].
///
/// A partition line has the shape `<path> : start=..., size=..., Id=<hex>`
/// where the path starts with `/`. Headers, blank lines, and partitions
/// whose type is not a hexadecimal id (GPT GUIDs) contribute nothing; all
/// but blank lines are counted as skipped.
#[must_use]
pub fn parse_partition_table(text: &str) -> ParseReport<PartitionTable> {
    let mut report = ParseReport::<PartitionTable>::default();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        match parse_partition_line(line) {
            Some((device, type_id)) => report.value.insert(device, type_id),
            None => report.skipped_lines += 1,
        }
    }
    report
}

fn parse_partition_line(line: &str) -> Option<(&str, u32)> {
    let (raw_device, attributes) = line.split_once(" : ")?;
    let device = raw_device.trim_end();
    if !device.starts_with('/') || device.contains(char::is_whitespace) {
        return None;
    }
    let type_id = attributes
        .split(',')
        .map(str::trim)
        .find_map(|field| TYPE_KEYS.iter().find_map(|key| field.strip_prefix(key)))?;
    if type_id.is_empty() || !type_id.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(type_id, 16)
        .ok()
        .map(|id| (device, id))
}

/// Returns `true` when a line of `table` starts with `device` followed by a
/// space.
///
/// Works for both `mount` and `swapon -s` output. The match is anchored at
/// the line start, so `/dev/sda1` does not match a line for `/dev/sda10` or
/// a line that merely mentions it later on.
#[must_use]
pub fn lists_device(table: &str, device: &str) -> bool {
    if device.is_empty() {
        return false;
    }
    table.lines().any(|line| {
        line.strip_prefix(device)
            .is_some_and(|rest| rest.starts_with(' '))
    })
}
