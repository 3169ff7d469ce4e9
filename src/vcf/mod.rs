//! GWAS-VCF support
//!
//! Reading and writing of GWAS summary-statistics VCF files: one row per
//! variant, one sample column per study, statistics in FORMAT fields.

mod parser;
mod record;
mod writer;

pub use parser::{
    open_gwas_vcf, parse_data_line, parse_gwas_vcf_str, FieldDescription, GwasHeader,
    GwasVcfReader, FORMAT_AF, FORMAT_ES, FORMAT_ID, FORMAT_LP, FORMAT_SE, FORMAT_SS,
};
pub use record::{lp_threshold, ProxyProvenance, VariantRecord};
pub use writer::{write_gwas_vcf, FORMAT_PR, FORMAT_R2};
