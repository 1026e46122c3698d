use crate::piece::manager::SchedulerError;
use crate::tracker::TrackerError;

#[derive(Debug)]
pub enum ClientError {
    Tracker(TrackerError),
    Scheduler(SchedulerError),
}

impl From<TrackerError> for ClientError {
    fn from(err: TrackerError) -> Self {
        ClientError::Tracker(err)
    }
}

impl From<SchedulerError> for ClientError {
    fn from(err: SchedulerError) -> Self {
        ClientError::Scheduler(err)
    }
}
