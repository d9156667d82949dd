/// Extension of a file name, keeping the inner extension of `.gz` files.
///
/// `T1w.nii.gz` yields `.nii.gz`, `events.tsv` yields `.tsv`, `README`
/// yields `None`.
#[must_use]
pub fn get_extension(name: &str) -> Option<String> {
    let (stem, last) = split_extension(name)?;
    if last.eq_ignore_ascii_case("gz") {
        if let Some((_, inner)) = split_extension(stem) {
            return Some(format!(".{inner}.{last}"));
        }
    }
    Some(format!(".{last}"))
}

fn split_extension(name: &str) -> Option<(&str, &str)> {
    let (stem, ext) = name.rsplit_once('.')?;
    (!stem.is_empty() && !ext.is_empty()).then_some((stem, ext))
}
