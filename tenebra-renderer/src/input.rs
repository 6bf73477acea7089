#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputEvent {
    NextRenderMode,
    PreviousRenderMode,
    NextCamera,
    PreviousCamera,
    TogglePause,
}

#[cfg(feature = "winit")]
impl InputEvent {
    /// Arrow keys cycle modes and cameras, space pauses.
    pub fn from_key_code(code: winit::keyboard::KeyCode) -> Option<Self> {
        use winit::keyboard::KeyCode;

        match code {
            KeyCode::ArrowRight => Some(Self::NextRenderMode),
            KeyCode::ArrowLeft => Some(Self::PreviousRenderMode),
            KeyCode::ArrowUp => Some(Self::NextCamera),
            KeyCode::ArrowDown => Some(Self::PreviousCamera),
            KeyCode::Space | KeyCode::Enter => Some(Self::TogglePause),
            _ => None,
        }
    }
}

#[cfg(all(test, feature = "winit"))]
mod tests {
    use super::*;
    use winit::keyboard::KeyCode;

    #[test]
    fn arrows_map_to_cycling_events() {
        assert_eq!(
            InputEvent::from_key_code(KeyCode::ArrowRight),
            Some(InputEvent::NextRenderMode)
        );
        assert_eq!(
            InputEvent::from_key_code(KeyCode::Space),
            Some(InputEvent::TogglePause)
        );
        assert_eq!(InputEvent::from_key_code(KeyCode::KeyQ), None);
    }
}
