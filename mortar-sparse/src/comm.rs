/// Collective reductions over the processes sharing a distributed object.
pub trait Communicator {
    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    fn sum_all_usize(&self, local: usize) -> usize;

    fn sum_all(&self, local: f64) -> f64;

    fn max_all(&self, local: f64) -> f64;

    /// Logical OR of a flag across all processes.
    fn any(&self, local: bool) -> bool;
}

/// The single-process communicator.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct SerialCommunicator;

impl Communicator for SerialCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn sum_all_usize(&self, local: usize) -> usize {
        local
    }

    fn sum_all(&self, local: f64) -> f64 {
        local
    }

    fn max_all(&self, local: f64) -> f64 {
        local
    }

    fn any(&self, local: bool) -> bool {
        local
    }
}
