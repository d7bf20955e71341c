use super::State;
use crate::{
    error::ParserError,
    parser::{ParserContext, scan::partial_suffix_len},
};

/// Plain prose between tool calls.
///
/// Text up to the earliest opener is emitted immediately. The only text held
/// back is a trailing fragment that could still grow into an opener.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct TextState;

impl TextState {
    pub(crate) fn run(self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        let rest = ctx.remaining();
        let mut best = None;
        let mut holdback = 0;
        for opener in ctx.openers() {
            if let Some(at) = rest.find(opener.pattern.as_str()) {
                let len = opener.pattern.len();
                let wins = match best {
                    None => true,
                    Some((best_at, best_len, _)) => {
                        at < best_at || (at == best_at && len > best_len)
                    }
                };
                if wins {
                    best = Some((at, len, opener.kind));
                }
            }
            holdback = holdback.max(partial_suffix_len(rest, &opener.pattern));
        }
        // A match inside the held-back tail may still turn into a longer
        // opener at the same position.
        let tail = rest.len() - holdback;
        match best {
            Some((at, _, kind)) if at < tail => {
                ctx.flush_text(at)?;
                ctx.transition_to(State::opening(kind));
            }
            _ => ctx.flush_text(tail)?,
        }
        Ok(())
    }

    pub(crate) fn finalize(self, ctx: &mut ParserContext) -> Result<(), ParserError> {
        ctx.flush_text(ctx.remaining().len())?;
        ctx.emit_segment_end();
        Ok(())
    }
}
