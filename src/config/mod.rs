pub mod project;

/// Knobs of the outlining pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OffloadOptions {
    /// Print one line per considered loop to stdout.
    pub report: bool,
    /// The whole program runs on a single execution unit, so nothing is
    /// ever remote.
    pub single_unit: bool,
    /// Work-items per work-group passed to every kernel launch.
    pub work_group_size: u32,
    /// Clone functions called from kernels as device copies.
    pub device_copies: bool,
    /// Outline explicit `kernel(count, size) { }` blocks.
    pub explicit_kernels: bool,
}

pub const DEFAULT_WORK_GROUP_SIZE: u32 = 64;

impl Default for OffloadOptions {
    fn default() -> Self {
        Self {
            report: false,
            single_unit: false,
            work_group_size: DEFAULT_WORK_GROUP_SIZE,
            device_copies: true,
            explicit_kernels: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = OffloadOptions::default();
        assert_eq!(opts.work_group_size, 64);
        assert!(!opts.report);
        assert!(opts.device_copies);
        assert!(opts.explicit_kernels);
    }
}
