//! Re-expressing a proxy's statistics on the requested variant's alleles.

use crate::ld::{LdTag, PanelAlleles};
use crate::vcf::{ProxyProvenance, VariantRecord};

/// Align a proxy record's alleles onto the requested variant.
///
/// With phase information the proxy's effect allele is relabelled as the
/// requested allele carried on the same haplotype (the estimate keeps its
/// sign). Without it, a negative correlation flips the record. Afterwards,
/// if the requested variant's panel alleles are known and the effect
/// allele is the panel's second allele, the record is flipped so the effect
/// allele is the panel's first allele.
///
/// The correlation sign is taken on the panel's first allele of both
/// variants, so relabelling an unphased proxy onto the requested alleles
/// needs the proxy's own panel alleles too.
///
/// Returns `None` when the proxy's alleles are not the ones in the phase,
/// or, without phase, not the ones the panel lists for the proxy.
pub fn align_alleles(
    record: &VariantRecord,
    tag: &LdTag,
    requested: Option<&PanelAlleles>,
    proxy: Option<&PanelAlleles>,
) -> Option<VariantRecord> {
    let mut aligned = record.clone();

    match &tag.phase {
        Some(phase) => {
            let effect = phase.target_allele_for(&record.effect)?;
            let other = phase.target_allele_for(&record.non_effect)?;
            if effect == other {
                return None;
            }
            aligned.effect = effect.to_string();
            aligned.non_effect = other.to_string();
        }
        None => {
            let mut negative = tag.sign().is_negative();
            if let Some(alleles) = requested {
                let proxy = proxy?;
                if record.effect == proxy.a2 && record.non_effect == proxy.a1 {
                    negative = !negative;
                } else if record.effect != proxy.a1 || record.non_effect != proxy.a2 {
                    return None;
                }
                if negative {
                    aligned.flip();
                }
                aligned.effect = alleles.a1.clone();
                aligned.non_effect = alleles.a2.clone();
            } else if negative {
                aligned.flip();
            }
            return Some(aligned);
        }
    }

    if let Some(alleles) = requested {
        if aligned.effect == alleles.a2 && aligned.non_effect == alleles.a1 {
            aligned.flip();
        }
    }
    Some(aligned)
}

/// Align a proxy record and relabel it as `requested_id`, recording the
/// proxy in its provenance.
pub fn align_proxy(
    record: &VariantRecord,
    tag: &LdTag,
    requested_id: &str,
    requested: Option<&PanelAlleles>,
    proxy: Option<&PanelAlleles>,
) -> Option<VariantRecord> {
    let mut aligned = align_alleles(record, tag, requested, proxy)?;
    aligned.id = Some(requested_id.to_string());
    aligned.proxy = Some(ProxyProvenance {
        proxy_id: record.display_id(),
        r2: tag.r2(),
        sign: tag.sign(),
    });
    Some(aligned)
}
