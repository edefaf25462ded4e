// Wire protocol for the realtime channel

mod frame;
mod kind;
pub mod models;


pub use frame::{FrameError, InboundFrame, OutboundFrame};
pub use kind::MessageKind;
pub use models::{AlarmLevel, AlarmStatusChange, EnvironmentReading, HandleStatus, LabAlarm};
