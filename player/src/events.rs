use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Event utility functions
pub mod event_utils {
    use super::*;

    /// Check if a key event matches Ctrl+C or Ctrl+Q (terminate)
    pub fn is_terminate_event(event: &Event) -> bool {
        matches!(
            event,
            Event::Key(KeyEvent {
                code: KeyCode::Char('c') | KeyCode::Char('q'),
                modifiers: KeyModifiers::CONTROL,
                ..
            })
        )
    }

    /// Key releases and repeats are reported on some platforms; only presses act
    pub fn is_key_press(key: &KeyEvent) -> bool {
        key.kind == KeyEventKind::Press
    }

    /// `:` opens the command prompt
    pub fn is_command_prompt_key(key: &KeyEvent) -> bool {
        key.code == KeyCode::Char(':') && !key.modifiers.contains(KeyModifiers::CONTROL)
    }
}

#[cfg(test)]
mod tests {
    use super::event_utils::*;
    use super::*;

    #[test]
    fn test_terminate_keys() {
        let ctrl_q = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        let plain_q = Event::Key(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(is_terminate_event(&ctrl_q));
        assert!(is_terminate_event(&ctrl_c));
        assert!(!is_terminate_event(&plain_q));
        assert!(!is_terminate_event(&Event::FocusGained));
    }

    #[test]
    fn test_key_press_filter() {
        let press = KeyEvent::new_with_kind(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Press);
        let release =
            KeyEvent::new_with_kind(KeyCode::Enter, KeyModifiers::NONE, KeyEventKind::Release);
        assert!(is_key_press(&press));
        assert!(!is_key_press(&release));
        assert!(is_command_prompt_key(&KeyEvent::new(KeyCode::Char(':'), KeyModifiers::SHIFT)));
    }
}
