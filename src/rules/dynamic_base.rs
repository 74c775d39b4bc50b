//! BV2004: images should opt in to ASLR via the dynamic-base flag.

use crate::binary::pe::IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE;
use crate::context::{AnalysisContext, ResultSink};
use crate::report::Severity;
use crate::rules::{gate_user_mode_image, Applicability, Rule};

pub struct DynamicBaseRule;

impl Rule for DynamicBaseRule {
    fn id(&self) -> &'static str {
        "BV2004"
    }

    fn name(&self) -> &'static str {
        "EnableAddressSpaceLayoutRandomization"
    }

    fn description(&self) -> &'static str {
        "Images should carry IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE so the loader \
         can relocate them, enabling address space layout randomization."
    }

    fn can_analyze(&self, ctx: &AnalysisContext) -> Applicability {
        match gate_user_mode_image(ctx) {
            Some(reason) => Applicability::NotApplicable(reason),
            None => Applicability::Applicable,
        }
    }

    fn analyze(&self, ctx: &AnalysisContext, sink: &mut ResultSink) -> anyhow::Result<()> {
        let dynamic = ctx
            .binary
            .pe()
            .and_then(|pe| pe.has_characteristic(IMAGE_DLLCHARACTERISTICS_DYNAMIC_BASE));
        match dynamic {
            Some(true) => sink.pass(format!(
                "'{}' is marked as relocatable and participates in ASLR.",
                ctx.target
            )),
            Some(false) => sink.fail(
                Severity::Error,
                format!(
                    "'{}' does not set the dynamic-base flag and will always load at its \
                     preferred address, defeating ASLR. Relink with /DYNAMICBASE.",
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
