/// Tries each candidate in order and returns the first successful result.
///
/// When every attempt fails the errors are returned in the order the
/// candidates were tried. An empty candidate list yields an empty error list.
pub fn first_success<C, T, E, F>(
    candidates: impl IntoIterator<Item = C>,
    mut attempt: F,
) -> std::result::Result<T, Vec<E>>
where
    F: FnMut(C) -> std::result::Result<T, E>,
{
    let mut errors = Vec::new();
    for candidate in candidates {
        match attempt(candidate) {
            Ok(value) => return Ok(value),
            Err(error) => errors.push(error),
        }
    }
    Err(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stops_at_first_success() {
        let mut tried = Vec::new();
        let result = first_success([1, 2, 3], |n| {
            tried.push(n);
            if n >= 2 { Ok(n * 10) } else { Err(n) }
        });
        assert_eq!(result, Ok(20));
        assert_eq!(tried, vec![1, 2]);
    }

    #[test]
    fn collects_errors_in_order() {
        let result: Result<(), Vec<&str>> = first_success(["a", "b"], Err);
        assert_eq!(result, Err(vec!["a", "b"]));
    }

    #[test]
    fn empty_candidates_fail_without_errors() {
        let result: Result<u8, Vec<()>> = first_success(Vec::<u8>::new(), Ok);
        assert_eq!(result, Err(Vec::new()));
    }
}
