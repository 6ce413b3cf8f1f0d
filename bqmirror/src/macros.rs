/// Creates a [`MirrorError`](crate::error::MirrorError) from a kind, a static
/// description and an optional detail expression.
#[macro_export]
macro_rules! mirror_error {
    ($kind:expr, $description:expr) => {
        $crate::error::MirrorError::from(($kind, $description))
    };
    ($kind:expr, $description:expr, $detail:expr) => {
        $crate::error::MirrorError::from(($kind, $description, $detail.to_string()))
    };
}

/// Returns early with a [`MirrorError`](crate::error::MirrorError) built from
/// the given arguments.
#[macro_export]
macro_rules! bail {
    ($kind:expr, $description:expr) => {
        return Err($crate::mirror_error!($kind, $description))
    };
    ($kind:expr, $description:expr, $detail:expr) => {
        return Err($crate::mirror_error!($kind, $description, $detail))
    };
}
