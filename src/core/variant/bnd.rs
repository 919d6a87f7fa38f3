use crate::utils::util::Result;

/// Joined locus described by a breakend ALT.
///
/// | ALT     | meaning                                              |
/// |---------|------------------------------------------------------|
/// | `t[p[`  | piece right of `p` joined after `t`                  |
/// | `t]p]`  | reverse complement piece left of `p` joined after `t` |
/// | `[p[t`  | reverse complement piece right of `p` joined before `t` |
/// | `]p]t`  | piece left of `p` joined before `t`                  |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Breakend {
    pub joined_chrom: String,
    /// 0-based
    pub joined_pos: i64,
    pub joined_is_pos_strand: bool,
    pub joined_is_after: bool,
}

impl Breakend {
    pub fn parse_alt(alt: &str) -> Result<Breakend> {
        let bracket = if alt.contains('[') {
            '['
        } else if alt.contains(']') {
            ']'
        } else {
            return Err(crate::vcf2df_error!("BND ALT is missing '[' or ']': {alt:?}"));
        };

        let mate = alt.split(bracket).nth(1).ok_or_else(|| {
            crate::vcf2df_error!("BND ALT is missing closing bracket '{bracket}': {alt:?}")
        })?;
        let (contig, pos) = mate.rsplit_once(':').ok_or_else(|| {
            crate::vcf2df_error!("BND ALT mate does not look like contig:pos: {mate:?}")
        })?;
        let pos_1based: i64 = pos
            .trim()
            .parse()
            .map_err(|e| crate::vcf2df_error!("Invalid BND ALT mate position {pos:?}: {e}"))?;
        if pos_1based <= 0 {
            return Err(crate::vcf2df_error!(
                "Invalid BND ALT mate position (must be >= 1): {pos_1based}"
            ));
        }

        let (joined_is_pos_strand, joined_is_after) = if alt.ends_with('[') {
            (true, true)
        } else if alt.ends_with(']') {
            (false, true)
        } else if alt.starts_with('[') {
            (true, false)
        } else {
            (false, false)
        };

        Ok(Breakend {
            joined_chrom: contig.trim().to_string(),
            joined_pos: pos_1based - 1,
            joined_is_pos_strand,
            joined_is_after,
        })
    }
}
