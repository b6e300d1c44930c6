//! Pub/sub topic naming: `devices/{deviceId}/{data|command|status}`.

use std::fmt;

use crate::domain::foundation::DeviceId;

/// Root segment shared by every device topic.
pub const TOPIC_ROOT: &str = "devices";

/// Direction/purpose of a device topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopicKind {
    /// Device → bridge measurement payloads.
    Data,
    /// Bridge → device command text.
    Command,
    /// Device → bridge free-form status text.
    Status,
}

impl TopicKind {
    fn segment(&self) -> &'static str {
        match self {
            TopicKind::Data => "data",
            TopicKind::Command => "command",
            TopicKind::Status => "status",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "data" => Some(TopicKind::Data),
            "command" => Some(TopicKind::Command),
            "status" => Some(TopicKind::Status),
            _ => None,
        }
    }
}

/// A fully-qualified device topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    device: DeviceId,
    kind: TopicKind,
}

impl Topic {
    pub fn new(device: DeviceId, kind: TopicKind) -> Self {
        Self { device, kind }
    }

    pub fn data(device: &DeviceId) -> Self {
        Self::new(device.clone(), TopicKind::Data)
    }

    pub fn command(device: &DeviceId) -> Self {
        Self::new(device.clone(), TopicKind::Command)
    }

    pub fn status(device: &DeviceId) -> Self {
        Self::new(device.clone(), TopicKind::Status)
    }

    /// Parses a channel name back into a topic. Returns `None` for foreign channels.
    pub fn parse(channel: &str) -> Option<Self> {
        let mut segments = channel.split('/');
        let root = segments.next()?;
        let device = segments.next()?;
        let kind = segments.next()?;
        if root != TOPIC_ROOT || segments.next().is_some() {
            return None;
        }
        let device = DeviceId::new(device).ok()?;
        Some(Self::new(device, TopicKind::from_segment(kind)?))
    }

    pub fn device(&self) -> &DeviceId {
        &self.device
    }

    pub fn kind(&self) -> TopicKind {
        self.kind
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", TOPIC_ROOT, self.device, self.kind.segment())
    }
}
