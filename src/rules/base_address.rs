//! BV2001: 64-bit images should prefer a base address above 4GB.
//!
//! A preferred base at or below the 4GB boundary puts ASLR on recent
//! Windows into a compatibility mode with far fewer relocation slots,
//! weakening it as a memory-corruption mitigation.

use crate::context::{AnalysisContext, ResultSink};
use crate::policy::PolicyOption;
use crate::report::Severity;
use crate::rules::{gate_user_mode_image, Applicability, Rule, SkipReason};

const FOUR_GIGABYTES: u64 = 0xFFFF_FFFF;

pub struct BaseAddressRule;

impl Rule for BaseAddressRule {
    fn id(&self) -> &'static str {
        "BV2001"
    }

    fn name(&self) -> &'static str {
        "LoadImageAboveFourGigabyteAddress"
    }

    fn description(&self) -> &'static str {
        "64-bit images should have a preferred base address above the 4GB boundary \
         so that ASLR does not fall back to its constrained compatibility mode."
    }

    fn options(&self) -> Vec<PolicyOption> {
        Vec::new()
    }

    fn can_analyze(&self, ctx: &AnalysisContext) -> Applicability {
        if let Some(reason) = gate_user_mode_image(ctx) {
            return Applicability::NotApplicable(reason);
        }
        // gate_user_mode_image guarantees a parsed PE view here.
        let applicable = ctx.binary.pe().is_some_and(|pe| pe.is_64bit());
        if !applicable {
            return Applicability::NotApplicable(SkipReason::Not64Bit);
        }
        Applicability::Applicable
    }

    fn analyze(&self, ctx: &AnalysisContext, sink: &mut ResultSink) -> anyhow::Result<()> {
        let Some(base) = ctx.binary.preferred_base() else {
            sink.error(format!(
                "'{}': preferred base address was not recoverable from the image header",
                ctx.target
            ));
            return Ok(());
        };

        if base <= FOUR_GIGABYTES {
            sink.fail(
                Severity::Error,
                format!(
                    "'{}' is a 64-bit image with a preferred base address ({base:#x}) below the \
                     4GB boundary, which reduces the effectiveness of ASLR. Rebase the image \
                     above 4GB or drop the custom /BASE setting.",
                    ctx.target
                ),
            );
        } else {
            sink.pass(format!(
                "'{}' is a 64-bit image with a preferred base address ({base:#x}) above the \
                 4GB boundary.",
                ctx.target
            ));
        }
        Ok(())
    }
}
