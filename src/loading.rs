/// Loading indicator state.
///
/// Shown while the scene is being set up and hidden once the level import settles.
/// The window shows it as a title suffix; [`LoadingIndicator::take_changed`] tells the
/// presenter when to refresh.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LoadingIndicator {
    visible: bool,
    shown: u32,
    hidden: u32,
    changed: bool,
}

impl LoadingIndicator {
    pub const TITLE_SUFFIX: &'static str = " (loading...)";

    /// Title a window starts with, before any scene exists.
    pub fn initial_title(title: &str) -> String {
        format!("{}{}", title, Self::TITLE_SUFFIX)
    }

    pub fn show(&mut self) {
        if !self.visible {
            self.visible = true;
            self.shown += 1;
            self.changed = true;
            log::info!("Loading indicator shown");
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            self.visible = false;
            self.hidden += 1;
            self.changed = true;
            log::info!("Loading indicator hidden");
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// How often the indicator went from hidden to shown.
    pub fn times_shown(&self) -> u32 {
        self.shown
    }

    /// How often the indicator went from shown to hidden.
    pub fn times_hidden(&self) -> u32 {
        self.hidden
    }

    /// Returns true once after every visibility change.
    pub fn take_changed(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn decorate_title(&self, title: &str) -> String {
        if self.visible {
            format!("{}{}", title, Self::TITLE_SUFFIX)
        } else {
            title.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hiding_twice_counts_once() {
        let mut indicator = LoadingIndicator::default();
        indicator.show();
        indicator.hide();
        indicator.hide();
        assert_eq!(indicator.times_shown(), 1);
        assert_eq!(indicator.times_hidden(), 1);
        assert!(!indicator.is_visible());
    }

    #[test]
    fn windows_open_with_the_indicator_showing() {
        let mut indicator = LoadingIndicator::default();
        indicator.show();
        assert_eq!(LoadingIndicator::initial_title("court"), indicator.decorate_title("court"));
    }

    #[test]
    fn changes_are_reported_once() {
        let mut indicator = LoadingIndicator::default();
        assert!(!indicator.take_changed());
        indicator.show();
        assert!(indicator.take_changed());
        assert!(!indicator.take_changed());
        assert_eq!(indicator.decorate_title("court"), "court (loading...)");
        indicator.hide();
        assert!(indicator.take_changed());
        assert_eq!(indicator.decorate_title("court"), "court");
    }
}
