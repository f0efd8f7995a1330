/// Failure raised by a [`PanelSurface`](crate::surface::PanelSurface) while
/// building elements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceError {
    DocumentUnavailable,
    Dom(String),
}

impl std::fmt::Display for SurfaceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SurfaceError::DocumentUnavailable => write!(f, "no document to build the panel in"),
            SurfaceError::Dom(msg) => write!(f, "panel element error: {msg}"),
        }
    }
}

impl std::error::Error for SurfaceError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    AlreadyAttached,
    Surface(SurfaceError),
}

impl std::fmt::Display for ControlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ControlError::AlreadyAttached => write!(f, "control is already attached to a map"),
            ControlError::Surface(err) => write!(f, "failed to build control: {err}"),
        }
    }
}

impl std::error::Error for ControlError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ControlError::Surface(err) => Some(err),
            ControlError::AlreadyAttached => None,
        }
    }
}

impl From<SurfaceError> for ControlError {
    fn from(err: SurfaceError) -> Self {
        ControlError::Surface(err)
    }
}
