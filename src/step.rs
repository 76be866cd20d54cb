/// What a coroutine reports after one resume.
///
/// `Yielded` carries the value it suspended with (`done == false`); `Complete`
/// carries its final outcome (`done == true`). After `Complete` the coroutine is
/// finished and is not resumed again.
///
/// ```rust
/// use codrive::Step;
///
/// let suspended: Step<&str, i32> = Step::Yielded("waiting");
/// assert!(!suspended.is_done());
///
/// let finished: Step<&str, i32> = Step::Complete(7);
/// assert_eq!(finished.map_complete(|n| n + 1), Step::Complete(8));
/// ```
#[derive(Debug, PartialEq)]
pub enum Step<Y, D> {
    Yielded(Y),
    Complete(D),
}

impl<Y, D> Step<Y, D> {
    pub fn is_yielded(&self) -> bool {
        matches!(self, Step::Yielded(_))
    }

    pub fn is_complete(&self) -> bool {
        matches!(self, Step::Complete(_))
    }

    /// The `done` flag: true once the coroutine has returned.
    pub fn is_done(&self) -> bool {
        self.is_complete()
    }

    /// Rewrite the final outcome, leaving a suspension untouched.
    pub fn map_complete<D2>(self, f: impl FnOnce(D) -> D2) -> Step<Y, D2> {
        match self {
            Step::Yielded(y) => Step::Yielded(y),
            Step::Complete(d) => Step::Complete(f(d)),
        }
    }

    /// The final outcome.
    ///
    /// # Panics
    ///
    /// If the coroutine suspended instead of finishing.
    pub fn unwrap_complete(self) -> D
    where
        Y: std::fmt::Debug,
    {
        match self {
            Step::Complete(d) => d,
            Step::Yielded(y) => panic!("coroutine suspended with {y:?} before returning"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_done_flag_follows_variant() {
        let suspended: Step<u8, u8> = Step::Yielded(1);
        assert!(suspended.is_yielded() && !suspended.is_done());

        let finished: Step<u8, u8> = Step::Complete(2);
        assert!(finished.is_complete() && finished.is_done());
    }

    #[test]
    fn test_map_complete_skips_suspension() {
        let suspended: Step<&str, u8> = Step::Yielded("y");
        assert_eq!(suspended.map_complete(|d| d * 2), Step::Yielded("y"));
    }

    #[test]
    #[should_panic(expected = "suspended")]
    fn test_unwrap_complete_on_suspension_panics() {
        let suspended: Step<&str, u8> = Step::Yielded("still going");
        suspended.unwrap_complete();
    }
}
