use std::fmt;

use tracing::debug;

use crate::error::CubeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertColor {
    Danger,
    Success,
}

impl AlertColor {
    pub fn as_str(self) -> &'static str {
        match self {
            AlertColor::Danger => "danger",
            AlertColor::Success => "success",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub color: AlertColor,
    pub message: String,
}

impl Alert {
    pub fn danger(message: impl Into<String>) -> Self {
        Self {
            color: AlertColor::Danger,
            message: message.into(),
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Self {
            color: AlertColor::Success,
            message: message.into(),
        }
    }
}

impl From<&CubeError> for Alert {
    fn from(err: &CubeError) -> Self {
        match err {
            CubeError::RequestFailed { status, .. } => {
                Alert::danger(format!("Request failed: {status}."))
            }
            other => Alert::danger(other.to_string()),
        }
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.color.as_str(), self.message)
    }
}

/// Additive alert list. Nothing is dismissed unless the caller asks.
#[derive(Debug, Clone, Default)]
pub struct Alerts {
    items: Vec<Alert>,
}

impl Alerts {
    pub fn push(&mut self, alert: Alert) {
        debug!(color = alert.color.as_str(), message = %alert.message, "alert raised");
        self.items.push(alert);
    }

    pub fn push_error(&mut self, err: &CubeError) {
        self.push(Alert::from(err));
    }

    pub fn dismiss(&mut self, index: usize) -> Option<Alert> {
        (index < self.items.len()).then(|| self.items.remove(index))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Alert> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn last(&self) -> Option<&Alert> {
        self.items.last()
    }
}
