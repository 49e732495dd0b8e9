//! Scoped language override for rendering
//!
//! The active language is thread-local: an override made by one worker is
//! never visible to another. Rendering is synchronous, so a guard held across
//! a render call covers exactly that call.

use std::cell::RefCell;
use std::marker::PhantomData;

thread_local! {
    static ACTIVE_LANGUAGE: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Language active on the current thread
pub fn active_language() -> Option<String> {
    ACTIVE_LANGUAGE.with(|active| active.borrow().clone())
}

/// Activates a language until dropped, then restores the previous one
///
/// Restoration happens on every exit path, including early returns and
/// panics unwinding through the render call.
#[must_use = "the language is restored as soon as the guard is dropped"]
pub struct LanguageOverride {
    previous: Option<String>,
    // Tied to the thread whose state it restores
    _not_send: PhantomData<*const ()>,
}

impl LanguageOverride {
    /// Activate `language`; `None` deactivates translation for the scope
    pub fn activate(language: Option<&str>) -> Self {
        let previous = ACTIVE_LANGUAGE.with(|active| {
            active.replace(language.map(str::to_string))
        });

        Self {
            previous,
            _not_send: PhantomData,
        }
    }
}

impl Drop for LanguageOverride {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_LANGUAGE.with(|active| {
            *active.borrow_mut() = previous;
        });
    }
}

/// Run `f` with `language` active when one is given
pub fn with_language<T>(language: Option<&str>, f: impl FnOnce() -> T) -> T {
    match language {
        Some(language) => {
            let _guard = LanguageOverride::activate(Some(language));
            f()
        }
        None => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_override_restores_previous() {
        let _outer = LanguageOverride::activate(Some("en"));
        {
            let _inner = LanguageOverride::activate(Some("it"));
            assert_eq!(active_language().as_deref(), Some("it"));
        }
        assert_eq!(active_language().as_deref(), Some("en"));
    }

    #[test]
    fn test_restored_after_panic() {
        let _outer = LanguageOverride::activate(Some("en"));

        let result = panic::catch_unwind(|| {
            let _guard = LanguageOverride::activate(Some("de"));
            panic!("render blew up");
        });

        assert!(result.is_err());
        assert_eq!(active_language().as_deref(), Some("en"));
    }

    #[test]
    fn test_with_language_none_keeps_current() {
        let _outer = LanguageOverride::activate(Some("fr"));
        let seen = with_language(None, active_language);
        assert_eq!(seen.as_deref(), Some("fr"));

        let seen = with_language(Some("es"), active_language);
        assert_eq!(seen.as_deref(), Some("es"));
        assert_eq!(active_language().as_deref(), Some("fr"));
    }

    #[test]
    fn test_override_is_thread_local() {
        let _guard = LanguageOverride::activate(Some("it"));
        let other = std::thread::spawn(active_language).join().unwrap();
        assert_eq!(other, None);
    }
}
