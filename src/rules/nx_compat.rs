//! BV2002: images should opt in to NX/DEP.

use crate::binary::pe::IMAGE_DLLCHARACTERISTICS_NX_COMPAT;
use crate::context::{AnalysisContext, ResultSink};
use crate::report::Severity;
use crate::rules::{gate_user_mode_image, Applicability, Rule};

pub struct NxCompatRule;

impl Rule for NxCompatRule {
    fn id(&self) -> &'static str {
        "BV2002"
    }

    fn name(&self) -> &'static str {
        "MarkImageAsNxCompatible"
    }

    fn description(&self) -> &'static str {
        "Images should be marked NX compatible so data pages are never executable \
         (DEP); the linker sets IMAGE_DLLCHARACTERISTICS_NX_COMPAT by default."
    }

    fn can_analyze(&self, ctx: &AnalysisContext) -> Applicability {
        match gate_user_mode_image(ctx) {
            Some(reason) => Applicability::NotApplicable(reason),
            None => Applicability::Applicable,
        }
    }

    fn analyze(&self, ctx: &AnalysisContext, sink: &mut ResultSink) -> anyhow::Result<()> {
        let nx = ctx
            .binary
            .pe()
            .and_then(|pe| pe.has_characteristic(IMAGE_DLLCHARACTERISTICS_NX_COMPAT));
        match nx {
            Some(true) => sink.pass(format!("'{}' is marked as NX compatible.", ctx.target)),
            Some(false) => sink.fail(
                Severity::Error,
                format!(
                    "'{}' is not marked NX compatible; its data pages may be mapped \
                     executable. Relink with /NXCOMPAT.",
                    ctx.target
                ),
            ),
            None => sink.error(format!(
                "'{}': DllCharacteristics were not recoverable from the image header",
                ctx.target
            )),
        }
        Ok(())
    }
}
