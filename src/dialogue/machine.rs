//! Dialogue transition function.
//!
//! `(session, event) → (session change, reply)` with no I/O: the caller
//! loads the session, applies the change to its store and sends the reply.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::event::Event;
use super::input::{parse_quantity, parse_size};
use super::prompts::{self, Field};
use super::reply::Reply;
use super::state::{Order, Selection, Session, Step};
use crate::config::Limits;
use crate::pricing::{self, PricingTable};

/// How the stored session must change after an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    /// Leave the store untouched.
    Unchanged,
    /// Discard any existing session and store this fresh one.
    Started(Session),
    /// Replace the existing session with this updated one.
    Advanced(Session),
}

/// Result of applying an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub change: SessionChange,
    pub reply: Reply,
}

impl Transition {
    fn unchanged(reply: Reply) -> Self {
        Self {
            change: SessionChange::Unchanged,
            reply,
        }
    }

    fn advanced(session: Session, reply: Reply) -> Self {
        Self {
            change: SessionChange::Advanced(session),
            reply,
        }
    }
}

/// The pricing dialogue: a price table plus input bounds.
#[derive(Debug, Clone)]
pub struct Dialogue {
    table: PricingTable,
    limits: Limits,
}

impl Dialogue {
    pub fn new(table: PricingTable, limits: Limits) -> Self {
        Self { table, limits }
    }

    /// Apply `event` from `user_id` to their current session, if any.
    pub fn transition(
        &self,
        user_id: &str,
        session: Option<&Session>,
        event: &Event,
        now: DateTime<Utc>,
    ) -> Transition {
        match (event, session) {
            (Event::Start | Event::Restart, _) => Transition {
                change: SessionChange::Started(Session::new(user_id, now)),
                reply: prompts::choose_material(&self.table),
            },
            (_, None) => Transition::unchanged(prompts::please_start()),
            (Event::SelectMaterial(key), Some(session)) => self.select_material(session, key, now),
            (Event::SelectSubtype(key), Some(session)) => self.select_subtype(session, key, now),
            (Event::Text(text), Some(session)) => self.text_input(session, text, now),
        }
    }

    /// The prompt for whatever the session is currently waiting for.
    pub fn current_prompt(&self, session: &Session) -> Reply {
        match &session.step {
            Step::AwaitingMaterial => prompts::choose_material(&self.table),
            Step::AwaitingSubtype { material } => match self.table.material(material) {
                Some(m) => prompts::choose_subtype(m),
                None => prompts::calculation_failed(),
            },
            Step::AwaitingWidth { .. } => prompts::ask(Field::Width),
            Step::AwaitingHeight { .. } => prompts::ask(Field::Height),
            Step::AwaitingQuantity { .. } => prompts::ask(Field::Quantity),
            Step::Completed { .. } => prompts::calculation_done(),
        }
    }

    fn select_material(&self, session: &Session, key: &str, now: DateTime<Utc>) -> Transition {
        if !matches!(session.step, Step::AwaitingMaterial) {
            return self.stale_button(session);
        }

        let Some(material) = self.table.material(key) else {
            tracing::warn!(user_id = %session.user_id, material = key, "Unknown material selected");
            return Transition::unchanged(prompts::calculation_failed());
        };

        let (next, reply) = if material.has_subtypes() {
            (
                Step::AwaitingSubtype {
                    material: material.key.clone(),
                },
                prompts::choose_subtype(material),
            )
        } else {
            (
                Step::AwaitingWidth {
                    selection: Selection {
                        material: material.key.clone(),
                        subtype: None,
                    },
                },
                prompts::material_chosen(&material.label),
            )
        };

        self.advance(session, next, reply, now)
    }

    fn select_subtype(&self, session: &Session, key: &str, now: DateTime<Utc>) -> Transition {
        let Step::AwaitingSubtype { material } = &session.step else {
            return self.stale_button(session);
        };

        let Some((entry, subtype)) = self
            .table
            .material(material)
            .and_then(|m| m.subtype(key).map(|s| (m, s)))
        else {
            tracing::warn!(
                user_id = %session.user_id,
                material = %material,
                subtype = key,
                "Unknown subtype selected"
            );
            return Transition::unchanged(prompts::calculation_failed());
        };
        let next = Step::AwaitingWidth {
            selection: Selection {
                material: entry.key.clone(),
                subtype: Some(subtype.key.clone()),
            },
        };
        let reply = prompts::material_chosen(&entry.display_name(Some(subtype.key.as_str())));
        self.advance(session, next, reply, now)
    }

    fn text_input(&self, session: &Session, text: &str, now: DateTime<Utc>) -> Transition {
        match &session.step {
            Step::AwaitingMaterial | Step::AwaitingSubtype { .. } => {
                Transition::unchanged(self.current_prompt(session).prefixed(prompts::USE_BUTTONS))
            }
            Step::AwaitingWidth { selection } => match parse_size(text, &self.limits) {
                Ok(width) => {
                    let next = Step::AwaitingHeight {
                        selection: selection.clone(),
                        width,
                    };
                    self.advance(session, next, prompts::ask(Field::Height), now)
                }
                Err(e) => Transition::unchanged(prompts::invalid_input(Field::Width, &e)),
            },
            Step::AwaitingHeight { selection, width } => match parse_size(text, &self.limits) {
                Ok(height) => {
                    let next = Step::AwaitingQuantity {
                        selection: selection.clone(),
                        width: *width,
                        height,
                    };
                    self.advance(session, next, prompts::ask(Field::Quantity), now)
                }
                Err(e) => Transition::unchanged(prompts::invalid_input(Field::Height, &e)),
            },
            Step::AwaitingQuantity {
                selection,
                width,
                height,
            } => match parse_quantity(text, &self.limits) {
                Ok(quantity) => self.complete(session, selection, *width, *height, quantity, now),
                Err(e) => Transition::unchanged(prompts::invalid_input(Field::Quantity, &e)),
            },
            Step::Completed { .. } => Transition::unchanged(prompts::calculation_done()),
        }
    }

    fn complete(
        &self,
        session: &Session,
        selection: &Selection,
        width: Decimal,
        height: Decimal,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Transition {
        let price = match pricing::compute(
            &self.table,
            &selection.material,
            selection.subtype.as_deref(),
            width,
            height,
            quantity,
        ) {
            Ok(price) => price,
            Err(e) => {
                tracing::warn!(user_id = %session.user_id, error = %e, "Price calculation failed");
                return Transition::unchanged(prompts::calculation_failed());
            }
        };

        let order = Order {
            selection: selection.clone(),
            width,
            height,
            quantity,
        };
        let reply = prompts::receipt(
            &prompts::selection_name(&self.table, selection),
            &order,
            &price,
        );
        self.advance(session, Step::Completed { order, price }, reply, now)
    }

    fn stale_button(&self, session: &Session) -> Transition {
        Transition::unchanged(self.current_prompt(session).prefixed(prompts::STALE_BUTTON))
    }

    fn advance(&self, session: &Session, next: Step, reply: Reply, now: DateTime<Utc>) -> Transition {
        let mut updated = session.clone();
        match updated.advance(next, now) {
            Ok(_) => Transition::advanced(updated, reply),
            Err(e) => {
                tracing::error!(user_id = %session.user_id, "{e}");
                Transition::unchanged(prompts::calculation_failed())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::dialogue::event::RESTART_DATA;
    use crate::dialogue::state::StepKind;
    use crate::pricing::{Material, Subtype};

    const USER: &str = "42";

    fn dialogue() -> Dialogue {
        Dialogue::new(PricingTable::default(), Limits::default())
    }

    fn dialogue_with_subtypes() -> Dialogue {
        let table = PricingTable::new(vec![
            Material::flat("банер", "Банер", dec!(300)),
            Material::with_subtypes(
                "пленка",
                "Пленка",
                vec![
                    Subtype {
                        key: "глянец".into(),
                        label: "Глянцевая".into(),
                        price: dec!(500),
                    },
                    Subtype {
                        key: "мат".into(),
                        label: "Матовая".into(),
                        price: dec!(550),
                    },
                ],
            ),
        ])
        .unwrap();
        Dialogue::new(table, Limits::default())
    }

    /// Feed events through the machine, keeping the session like a store would.
    fn run(dialogue: &Dialogue, events: &[Event]) -> (Option<Session>, Reply) {
        let mut session: Option<Session> = None;
        let mut last = Reply::text("");
        for event in events {
            let t = dialogue.transition(USER, session.as_ref(), event, Utc::now());
            match t.change {
                SessionChange::Unchanged => {}
                SessionChange::Started(s) | SessionChange::Advanced(s) => session = Some(s),
            }
            last = t.reply;
        }
        (session, last)
    }

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    fn material(key: &str) -> Event {
        Event::SelectMaterial(key.to_string())
    }

    #[test]
    fn start_offers_materials() {
        let (session, reply) = run(&dialogue(), &[Event::Start]);
        assert_eq!(session.unwrap().kind(), StepKind::AwaitingMaterial);
        assert_eq!(reply.buttons.len(), 3);
    }

    #[test]
    fn banner_scenario_prices_1800() {
        let (session, reply) = run(
            &dialogue(),
            &[Event::Start, material("банер"), text("2"), text("3"), text("1")],
        );
        let session = session.unwrap();
        match &session.step {
            Step::Completed { order, price } => {
                assert_eq!(order.width, dec!(2));
                assert_eq!(order.height, dec!(3));
                assert_eq!(order.quantity, 1);
                assert_eq!(price.amount(), dec!(1800));
            }
            other => panic!("expected completed, got {other:?}"),
        }
        assert!(reply.text.contains("1 800,00 руб."));
        assert!(reply.has_button(RESTART_DATA));
    }

    #[test]
    fn comma_decimal_is_accepted() {
        let (session, _) = run(
            &dialogue(),
            &[Event::Start, material("холст"), text("1,5"), text("0.5"), text("2")],
        );
        match session.unwrap().step {
            Step::Completed { price, .. } => assert_eq!(price.amount(), dec!(1050)),
            other => panic!("expected completed, got {other:?}"),
        }
    }

    #[test]
    fn text_before_start_creates_nothing() {
        let d = dialogue();
        let t = d.transition(USER, None, &text("2"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert_eq!(t.reply.text, prompts::PLEASE_START);

        let t = d.transition(USER, None, &material("банер"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert_eq!(t.reply.text, prompts::PLEASE_START);
    }

    #[test]
    fn invalid_width_keeps_step() {
        let d = dialogue();
        let (session, _) = run(&d, &[Event::Start, material("банер")]);
        let session = session.unwrap();

        for bad in ["0.05", "50.1", "abc", ""] {
            let t = d.transition(USER, Some(&session), &text(bad), Utc::now());
            assert_eq!(t.change, SessionChange::Unchanged, "{bad:?}");
            assert!(t.reply.text.starts_with('❌'), "{bad:?}: {}", t.reply.text);
            assert!(t.reply.text.ends_with(prompts::field_prompt(Field::Width)));
        }

        let t = d.transition(USER, Some(&session), &text("50.0"), Utc::now());
        assert!(matches!(t.change, SessionChange::Advanced(ref s) if s.kind() == StepKind::AwaitingHeight));
    }

    #[test]
    fn quantity_bounds_in_dialogue() {
        let d = dialogue();
        let (session, _) = run(&d, &[Event::Start, material("банер"), text("1"), text("1")]);
        let session = session.unwrap();
        assert_eq!(session.kind(), StepKind::AwaitingQuantity);

        for bad in ["0", "1001", "2.5"] {
            let t = d.transition(USER, Some(&session), &text(bad), Utc::now());
            assert_eq!(t.change, SessionChange::Unchanged, "{bad:?}");
        }
        for good in ["1", "1000"] {
            let t = d.transition(USER, Some(&session), &text(good), Utc::now());
            assert!(matches!(t.change, SessionChange::Advanced(ref s) if s.kind() == StepKind::Completed));
        }
    }

    #[test]
    fn completed_ignores_text() {
        let d = dialogue();
        let (session, _) = run(
            &d,
            &[Event::Start, material("банер"), text("2"), text("3"), text("1")],
        );
        let session = session.unwrap();
        let t = d.transition(USER, Some(&session), &text("5"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert_eq!(t.reply.text, prompts::CALCULATION_DONE);
        assert!(t.reply.has_button(RESTART_DATA));
    }

    #[test]
    fn restart_from_every_step_resets() {
        let d = dialogue();
        let prefixes: Vec<Vec<Event>> = vec![
            vec![],
            vec![Event::Start],
            vec![Event::Start, material("банер")],
            vec![Event::Start, material("банер"), text("2")],
            vec![Event::Start, material("банер"), text("2"), text("3")],
            vec![Event::Start, material("банер"), text("2"), text("3"), text("1")],
        ];
        for prefix in prefixes {
            let (session, _) = run(&d, &prefix);
            let t = d.transition(USER, session.as_ref(), &Event::Restart, Utc::now());
            match t.change {
                SessionChange::Started(s) => assert_eq!(s.step, Step::AwaitingMaterial),
                other => panic!("expected a fresh session, got {other:?}"),
            }
            assert_eq!(t.reply, prompts::choose_material(&d.table));
        }
    }

    #[test]
    fn subtype_flow() {
        let d = dialogue_with_subtypes();
        let (session, reply) = run(&d, &[Event::Start, material("пленка")]);
        assert_eq!(session.as_ref().unwrap().kind(), StepKind::AwaitingSubtype);
        assert!(reply.has_button("subtype:мат"));

        let (session, reply) = run(
            &d,
            &[
                Event::Start,
                material("пленка"),
                Event::SelectSubtype("мат".into()),
                text("2"),
                text("1"),
                text("3"),
            ],
        );
        match session.unwrap().step {
            Step::Completed { order, price } => {
                assert_eq!(order.selection.subtype.as_deref(), Some("мат"));
                assert_eq!(price.amount(), dec!(3300));
            }
            other => panic!("expected completed, got {other:?}"),
        }
        assert!(reply.text.contains("Пленка (Матовая)"));
    }

    #[test]
    fn stale_material_button_is_not_applied() {
        let d = dialogue();
        let (session, _) = run(&d, &[Event::Start, material("банер"), text("2")]);
        let session = session.unwrap();
        let t = d.transition(USER, Some(&session), &material("холст"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert!(t.reply.text.starts_with(prompts::STALE_BUTTON));
        assert!(t.reply.text.ends_with(prompts::field_prompt(Field::Height)));
    }

    #[test]
    fn subtype_button_outside_subtype_step_is_stale() {
        let d = dialogue_with_subtypes();
        let (session, _) = run(&d, &[Event::Start]);
        let t = d.transition(
            USER,
            session.as_ref(),
            &Event::SelectSubtype("мат".into()),
            Utc::now(),
        );
        assert_eq!(t.change, SessionChange::Unchanged);
        assert!(t.reply.text.starts_with(prompts::STALE_BUTTON));
    }

    #[test]
    fn unknown_material_is_a_fault() {
        let d = dialogue();
        let (session, _) = run(&d, &[Event::Start]);
        let t = d.transition(USER, session.as_ref(), &material("бумага"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert_eq!(t.reply.text, prompts::CALCULATION_FAILED);
    }

    #[test]
    fn text_while_choosing_repeats_buttons() {
        let d = dialogue();
        let (session, _) = run(&d, &[Event::Start]);
        let t = d.transition(USER, session.as_ref(), &text("банер"), Utc::now());
        assert_eq!(t.change, SessionChange::Unchanged);
        assert!(t.reply.text.starts_with(prompts::USE_BUTTONS));
        assert_eq!(t.reply.buttons.len(), 3);
    }

    #[test]
    fn totals_are_symmetric_in_width_and_height() {
        let d = dialogue();
        let sizes = ["0.1", "1,25", "3", "49.9"];
        for w in sizes {
            for h in sizes {
                let price = |a: &str, b: &str| -> Decimal {
                    let (session, _) =
                        run(&d, &[Event::Start, material("пленка"), text(a), text(b), text("7")]);
                    match session.unwrap().step {
                        Step::Completed { price, .. } => price.amount(),
                        other => panic!("expected completed, got {other:?}"),
                    }
                };
                assert_eq!(price(w, h), price(h, w));
            }
        }
    }
}
