// Failures that indicate a bug in the server rather than a bad request. They are still reported
// to the client through the regular error channel, tagged with the source location.
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)+) => {
        $crate::game::InvalidAction(format!(
            "internal error at {}:{}: {}",
            file!(),
            line!(),
            format!($($arg)*)
        ))
    };
}


#[cfg(test)]
mod tests {
    #[test]
    fn internal_error_has_location() {
        let err = internal_error!("room {} vanished", "x7Yz");
        assert!(err.0.starts_with("internal error at "));
        assert!(err.0.ends_with(": room x7Yz vanished"));
    }
}
