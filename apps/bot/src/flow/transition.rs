//! Pure flow transitions: given a session and an input, produce the next
//! session and the effects to run. No I/O happens here.

use super::effect::Effect;
use super::session::{
    ComposeKind, ComposeStep, ComposeTarget, FlowAction, FlowInput, OnboardingStep, Session,
};
use super::texts;
use crate::models::Role;
use crate::telegram::{InlineButton, KeyboardButton, ReplyMarkup};

/// Result of a transition. `next: None` ends the session.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub next: Option<Session>,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(session: Session) -> Self {
        Self {
            next: Some(session),
            effects: vec![],
        }
    }

    fn end() -> Self {
        Self {
            next: None,
            effects: vec![],
        }
    }

    fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Starts (or restarts) a compose flow with an empty draft.
pub fn enter_compose(target: ComposeTarget) -> Transition {
    let kind = target.kind();
    Transition::to(Session::Compose {
        target,
        step: ComposeStep::AwaitText,
    })
    .with_effect(Effect::reply(texts::ask_text(kind)))
}

pub fn enter_onboarding() -> Transition {
    Transition::to(Session::Onboarding {
        step: OnboardingStep::AwaitRole,
    })
    .with_effect(Effect::reply_with(texts::WELCOME, role_keyboard()))
}

/// Advances `session` by one input.
pub fn step(session: Session, input: FlowInput) -> Transition {
    match session {
        Session::Compose { target, step } => step_compose(target, step, input),
        Session::Onboarding { step } => step_onboarding(step, input),
    }
}

fn step_compose(target: ComposeTarget, step: ComposeStep, input: FlowInput) -> Transition {
    let kind = target.kind();
    match (step, input) {
        // Text collection: the first text is the draft body, verbatim.
        (ComposeStep::AwaitText, FlowInput::Text(text)) => Transition::to(Session::Compose {
            target,
            step: ComposeStep::AwaitAssetsOrDone {
                text,
                assets: vec![],
            },
        })
        .with_effect(Effect::reply_with(texts::ASK_ASSETS, done_keyboard())),

        (step @ ComposeStep::AwaitText, FlowInput::Photo(_) | FlowInput::Unsupported) => {
            Transition::to(Session::Compose { target, step })
                .with_effect(Effect::reply(texts::TEXT_EXPECTED))
        }

        // Image collection.
        (ComposeStep::AwaitAssetsOrDone { text, mut assets }, FlowInput::Photo(file_id)) => {
            assets.push(file_id);
            Transition::to(Session::Compose {
                target,
                step: ComposeStep::AwaitAssetsOrDone { text, assets },
            })
            .with_effect(Effect::reply(texts::ASSET_ADDED))
        }

        (ComposeStep::AwaitAssetsOrDone { text, assets }, FlowInput::Text(label))
            if label == texts::DONE_LABEL =>
        {
            if text.trim().is_empty() {
                return restart(target);
            }
            Transition::to(Session::Compose {
                target,
                step: ComposeStep::AwaitConfirm {
                    text: text.clone(),
                    assets: assets.clone(),
                },
            })
            .with_effects([
                Effect::reply_with(texts::preview_intro(kind), ReplyMarkup::RemoveKeyboard),
                Effect::Preview { text, assets },
                Effect::reply_with(texts::confirm_question(kind), confirm_keyboard(kind)),
            ])
        }

        (
            step @ ComposeStep::AwaitAssetsOrDone { .. },
            FlowInput::Text(_) | FlowInput::Unsupported,
        ) => Transition::to(Session::Compose { target, step })
            .with_effect(Effect::reply(texts::ONLY_ASSETS)),

        // Confirmation.
        (ComposeStep::AwaitConfirm { text, assets }, FlowInput::Action(FlowAction::Submit(k)))
            if k == kind =>
        {
            if text.trim().is_empty() {
                return restart(target);
            }
            Transition::end().with_effects([
                Effect::EditOrigin {
                    text: texts::creating(kind).to_string(),
                },
                Effect::Submit {
                    target,
                    text,
                    assets,
                },
            ])
        }

        (ComposeStep::AwaitConfirm { .. }, FlowInput::Action(FlowAction::Cancel(k)))
            if k == kind =>
        {
            Transition::end().with_effect(Effect::EditOrigin {
                text: texts::cancelled(kind).to_string(),
            })
        }

        (
            step @ ComposeStep::AwaitConfirm { .. },
            FlowInput::Text(_) | FlowInput::Photo(_) | FlowInput::Unsupported,
        ) => Transition::to(Session::Compose { target, step })
            .with_effect(Effect::reply(texts::CONFIRM_EXPECTED)),

        // Buttons from stale messages or another flow are ignored.
        (step, FlowInput::Action(_)) => Transition::to(Session::Compose { target, step }),
    }
}

fn step_onboarding(step: OnboardingStep, input: FlowInput) -> Transition {
    match (step, input) {
        (OnboardingStep::AwaitRole, FlowInput::Action(FlowAction::PickRole(role)))
            if role != Role::Pending =>
        {
            Transition::to(Session::Onboarding {
                step: OnboardingStep::AwaitContact { role },
            })
            .with_effects([
                Effect::EditOrigin {
                    text: texts::role_chosen(role),
                },
                Effect::reply(texts::ASK_CONTACT),
            ])
        }

        (step @ OnboardingStep::AwaitRole, FlowInput::Action(_)) => {
            Transition::to(Session::Onboarding { step })
        }

        (step @ OnboardingStep::AwaitRole, _) => Transition::to(Session::Onboarding { step })
            .with_effect(Effect::reply_with(texts::WELCOME, role_keyboard())),

        (OnboardingStep::AwaitContact { role }, FlowInput::Text(contact))
            if !contact.trim().is_empty() =>
        {
            Transition::end().with_effects([
                Effect::SaveProfile {
                    role,
                    contact_info: contact.trim().to_string(),
                },
                Effect::reply(texts::onboarding_done(role)),
            ])
        }

        (step @ OnboardingStep::AwaitContact { .. }, FlowInput::Action(_)) => {
            Transition::to(Session::Onboarding { step })
        }

        (step @ OnboardingStep::AwaitContact { .. }, _) => {
            Transition::to(Session::Onboarding { step })
                .with_effect(Effect::reply(texts::ASK_CONTACT))
        }
    }
}

/// Drops a corrupted draft and starts over from text entry.
fn restart(target: ComposeTarget) -> Transition {
    let kind = target.kind();
    let entry = enter_compose(target);
    Transition {
        next: entry.next,
        effects: std::iter::once(Effect::reply(texts::missing_text(kind)))
            .chain(entry.effects)
            .collect(),
    }
}

fn done_keyboard() -> ReplyMarkup {
    ReplyMarkup::Keyboard {
        rows: vec![vec![KeyboardButton::text(texts::DONE_LABEL)]],
        one_time: true,
    }
}

pub fn confirm_keyboard(kind: ComposeKind) -> ReplyMarkup {
    ReplyMarkup::Inline(vec![vec![
        InlineButton::new(
            texts::SUBMIT_BUTTON,
            FlowAction::Submit(kind).callback_data(),
        ),
        InlineButton::new(
            texts::CANCEL_BUTTON,
            FlowAction::Cancel(kind).callback_data(),
        ),
    ]])
}

fn role_keyboard() -> ReplyMarkup {
    ReplyMarkup::Inline(vec![vec![
        InlineButton::new(
            texts::DESIGNER_BUTTON,
            FlowAction::PickRole(Role::Designer).callback_data(),
        ),
        InlineButton::new(
            texts::SUPPLIER_BUTTON,
            FlowAction::PickRole(Role::Supplier).callback_data(),
        ),
    ]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn compose(step: ComposeStep) -> Session {
        Session::Compose {
            target: ComposeTarget::Request,
            step,
        }
    }

    fn text(s: &str) -> FlowInput {
        FlowInput::Text(s.to_string())
    }

    fn next_step(t: &Transition) -> &ComposeStep {
        match &t.next {
            Some(Session::Compose { step, .. }) => step,
            other => panic!("expected compose session, got {other:?}"),
        }
    }

    #[test]
    fn test_entry_prompts_for_text() {
        let t = enter_compose(ComposeTarget::Request);
        assert_eq!(next_step(&t), &ComposeStep::AwaitText);
        assert_eq!(t.effects, vec![Effect::reply("Введите текст вашей заявки:")]);
    }

    #[test]
    fn test_text_then_done_without_assets_previews_text_only() {
        let t = step(compose(ComposeStep::AwaitText), text("Нужен дизайн визитки"));
        assert_eq!(
            next_step(&t),
            &ComposeStep::AwaitAssetsOrDone {
                text: "Нужен дизайн визитки".into(),
                assets: vec![],
            }
        );

        let t = step(t.next.unwrap(), text("Готово"));
        assert_eq!(
            next_step(&t),
            &ComposeStep::AwaitConfirm {
                text: "Нужен дизайн визитки".into(),
                assets: vec![],
            }
        );
        assert!(t.effects.contains(&Effect::Preview {
            text: "Нужен дизайн визитки".into(),
            assets: vec![],
        }));
    }

    #[test]
    fn test_photos_append_in_order_without_dedup() {
        let mut session = compose(ComposeStep::AwaitAssetsOrDone {
            text: "x".into(),
            assets: vec![],
        });
        for id in ["a", "b", "a"] {
            let t = step(session, FlowInput::Photo(id.into()));
            assert_eq!(t.effects, vec![Effect::reply(texts::ASSET_ADDED)]);
            session = t.next.unwrap();
        }
        assert_eq!(
            session,
            compose(ComposeStep::AwaitAssetsOrDone {
                text: "x".into(),
                assets: vec!["a".into(), "b".into(), "a".into()],
            })
        );
    }

    #[test]
    fn test_done_label_is_case_sensitive() {
        let before = compose(ComposeStep::AwaitAssetsOrDone {
            text: "x".into(),
            assets: vec![],
        });
        let t = step(before.clone(), text("готово"));
        assert_eq!(t.next, Some(before));
        assert_eq!(t.effects, vec![Effect::reply(texts::ONLY_ASSETS)]);
    }

    #[test]
    fn test_unsupported_input_does_not_advance() {
        let before = compose(ComposeStep::AwaitAssetsOrDone {
            text: "x".into(),
            assets: vec!["p".into()],
        });
        let t = step(before.clone(), FlowInput::Unsupported);
        assert_eq!(t.next, Some(before));
    }

    #[test]
    fn test_submit_ends_session_with_submit_effect() {
        let t = step(
            compose(ComposeStep::AwaitConfirm {
                text: "Нужен логотип".into(),
                assets: vec!["p1".into()],
            }),
            FlowInput::Action(FlowAction::Submit(ComposeKind::Request)),
        );
        assert_eq!(t.next, None);
        assert_eq!(
            t.effects.last(),
            Some(&Effect::Submit {
                target: ComposeTarget::Request,
                text: "Нужен логотип".into(),
                assets: vec!["p1".into()],
            })
        );
    }

    #[test]
    fn test_submit_with_empty_text_restarts() {
        let t = step(
            compose(ComposeStep::AwaitConfirm {
                text: "   ".into(),
                assets: vec![],
            }),
            FlowInput::Action(FlowAction::Submit(ComposeKind::Request)),
        );
        assert_eq!(next_step(&t), &ComposeStep::AwaitText);
        assert!(!t.effects.iter().any(|e| matches!(e, Effect::Submit { .. })));
        assert_eq!(t.effects[0], Effect::reply(texts::missing_text(ComposeKind::Request)));
    }

    #[test]
    fn test_cancel_discards_draft() {
        let t = step(
            compose(ComposeStep::AwaitConfirm {
                text: "x".into(),
                assets: vec![],
            }),
            FlowInput::Action(FlowAction::Cancel(ComposeKind::Request)),
        );
        assert_eq!(t.next, None);
        assert_eq!(
            t.effects,
            vec![Effect::EditOrigin {
                text: "Создание заявки отменено.".into()
            }]
        );
    }

    #[test]
    fn test_submit_for_other_flow_is_ignored() {
        let before = compose(ComposeStep::AwaitConfirm {
            text: "x".into(),
            assets: vec![],
        });
        let t = step(
            before.clone(),
            FlowInput::Action(FlowAction::Submit(ComposeKind::Response)),
        );
        assert_eq!(t.next, Some(before));
        assert!(t.effects.is_empty());
    }

    #[test]
    fn test_response_flow_carries_request_id() {
        let request_id = Uuid::new_v4();
        let target = ComposeTarget::Response { request_id };
        let t = step(
            Session::Compose {
                target: target.clone(),
                step: ComposeStep::AwaitConfirm {
                    text: "Сделаю за 3 дня".into(),
                    assets: vec![],
                },
            },
            FlowInput::Action(FlowAction::Submit(ComposeKind::Response)),
        );
        assert!(t.effects.contains(&Effect::Submit {
            target,
            text: "Сделаю за 3 дня".into(),
            assets: vec![],
        }));
    }

    #[test]
    fn test_onboarding_collects_role_then_contact() {
        let t = enter_onboarding();
        let t = step(
            t.next.unwrap(),
            FlowInput::Action(FlowAction::PickRole(Role::Supplier)),
        );
        assert_eq!(
            t.next,
            Some(Session::Onboarding {
                step: OnboardingStep::AwaitContact {
                    role: Role::Supplier
                }
            })
        );

        let t = step(t.next.unwrap(), text("  +7 900 123-45-67 "));
        assert_eq!(t.next, None);
        assert_eq!(
            t.effects[0],
            Effect::SaveProfile {
                role: Role::Supplier,
                contact_info: "+7 900 123-45-67".into(),
            }
        );
    }

    #[test]
    fn test_onboarding_text_before_role_repeats_question() {
        let t = step(
            Session::Onboarding {
                step: OnboardingStep::AwaitRole,
            },
            text("привет"),
        );
        assert_eq!(
            t.next,
            Some(Session::Onboarding {
                step: OnboardingStep::AwaitRole
            })
        );
        assert!(matches!(
            &t.effects[0],
            Effect::Reply { text, markup: Some(_) } if text == texts::WELCOME
        ));
    }
}
