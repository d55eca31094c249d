use crate::names::AvatarBook;
use crate::pipeline::Context;
use replay_state::{Clip, Event, EventLog, UNKNOWN_DEPLOYED};
use std::cmp::Ordering;
use tracing::{info, warn};

/// Turns the difference between consecutive clips into events.
pub struct ChangeReconstructor<'a> {
    ctx: Context<'a>,
    book: &'a AvatarBook,
}

impl<'a> ChangeReconstructor<'a> {
    pub fn new(ctx: Context<'a>, book: &'a AvatarBook) -> Self {
        Self { ctx, book }
    }

    /// Append the events that lead from `prev` to `clip`.
    ///
    /// A smaller tray means units were deployed: tray units missing from `clip`
    /// are paired, in tray order, with newly occupied tiles in map order. More
    /// than one deploy per clip may pair the wrong way round. A larger tray
    /// means units retreated from every tile no longer occupied.
    pub fn apply(&self, prev: &mut Clip, clip: &mut Clip, log: &mut EventLog) {
        match clip.deployment.len().cmp(&prev.deployment.len()) {
            Ordering::Equal => warn!(
                "Clips {}..{} and {}..{} have the same tray size ({})",
                prev.start_frame,
                prev.end_frame,
                clip.start_frame,
                clip.end_frame,
                clip.deployment.len()
            ),
            Ordering::Less => self.deploys(prev, clip, log),
            Ordering::Greater => Self::retreats(prev, clip, log),
        }
    }

    fn deploys(&self, prev: &mut Clip, clip: &mut Clip, log: &mut EventLog) {
        self.book.resolve_names(&self.ctx, &mut prev.deployment);
        self.book.resolve_names(&self.ctx, &mut clip.deployment);

        let remaining: Vec<&str> = clip
            .deployment
            .iter()
            .filter_map(|s| s.name.as_deref())
            .collect();
        let deployed: Vec<&str> = prev
            .deployment
            .iter()
            .filter_map(|s| s.name.as_deref())
            .filter(|name| !remaining.contains(name))
            .collect();
        info!("Deployed at frame {}: {:?}", clip.start_frame, deployed);
        if deployed.is_empty() {
            warn!(
                "Tray shrank at frame {} but no known unit left it",
                clip.start_frame
            );
        }

        let mut names = deployed.into_iter();
        for (loc, oper) in clip.newcomers() {
            let name = names.next().unwrap_or(UNKNOWN_DEPLOYED);
            log.push(Event::Deploy {
                name: name.to_string(),
                location: *loc,
                direction: oper.direction,
            });
        }
    }

    fn retreats(prev: &Clip, clip: &Clip, log: &mut EventLog) {
        for loc in prev.battlefield.keys() {
            if !clip.battlefield.contains_key(loc) {
                info!("Retreat from {:?} at frame {}", loc, clip.start_frame);
                log.push(Event::Retreat { location: *loc });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{named_tray, Fixture};
    use replay_data::{Location, Role};
    use replay_state::{BattlefieldOperator, DeploymentSlot, Direction};

    fn clip(start: usize, tray: Vec<DeploymentSlot>, field: &[(Location, Option<Direction>)]) -> Clip {
        let mut clip = Clip::open(start, tray);
        clip.close(start + 10);
        for &(loc, newcomer) in field {
            clip.battlefield.insert(
                loc,
                BattlefieldOperator {
                    direction: newcomer.unwrap_or_default(),
                    newcomer: newcomer.is_some(),
                },
            );
        }
        clip
    }

    fn replay(clips: Vec<Clip>, book: &AvatarBook, fx: &Fixture) -> Vec<Event> {
        let reconstructor = ChangeReconstructor::new(fx.ctx(), book);
        let mut log = EventLog::new("1-7", vec!["A".into(), "B".into()]);
        let mut prev: Option<Clip> = None;
        for mut clip in clips {
            if let Some(p) = prev.as_mut() {
                reconstructor.apply(p, &mut clip, &mut log);
            }
            prev = Some(clip);
        }
        log.events().to_vec()
    }

    const L23: Location = Location { x: 2, y: 3 };
    const L41: Location = Location { x: 4, y: 1 };

    #[test]
    fn test_two_deploys_in_order() {
        let fx = Fixture::new();
        let book = fx.book();
        let clips = vec![
            clip(0, named_tray(&[("A", Role::Sniper), ("B", Role::Tank)]), &[]),
            clip(10, named_tray(&[("B", Role::Tank)]), &[(L23, Some(Direction::Up))]),
            clip(
                20,
                vec![],
                &[(L23, None), (L41, Some(Direction::Right))],
            ),
        ];

        assert_eq!(
            replay(clips, &book, &fx),
            vec![
                Event::Deploy {
                    name: "A".into(),
                    location: L23,
                    direction: Direction::Up
                },
                Event::Deploy {
                    name: "B".into(),
                    location: L41,
                    direction: Direction::Right
                },
            ]
        );
    }

    #[test]
    fn test_deploy_retreat_deploy_in_order() {
        let fx = Fixture::new();
        let book = fx.book();
        let both = || named_tray(&[("A", Role::Sniper), ("B", Role::Tank)]);
        let clips = vec![
            clip(0, both(), &[]),
            clip(10, named_tray(&[("B", Role::Tank)]), &[(L23, Some(Direction::Up))]),
            clip(20, both(), &[]),
            clip(30, named_tray(&[("A", Role::Sniper)]), &[(L41, Some(Direction::Right))]),
        ];

        assert_eq!(
            replay(clips, &book, &fx),
            vec![
                Event::Deploy {
                    name: "A".into(),
                    location: L23,
                    direction: Direction::Up
                },
                Event::Retreat { location: L23 },
                Event::Deploy {
                    name: "B".into(),
                    location: L41,
                    direction: Direction::Right
                },
            ]
        );
    }

    #[test]
    fn test_retreat_on_tray_growth() {
        let fx = Fixture::new();
        let book = fx.book();
        let clips = vec![
            clip(0, vec![], &[(L23, Some(Direction::Left)), (L41, Some(Direction::Up))]),
            clip(10, named_tray(&[("B", Role::Tank)]), &[(L41, None)]),
        ];

        assert_eq!(
            replay(clips, &book, &fx),
            vec![Event::Retreat { location: L23 }]
        );
    }

    #[test]
    fn test_single_retreat_after_deploy() {
        let fx = Fixture::new();
        let book = fx.book();
        let clips = vec![
            clip(0, named_tray(&[("B", Role::Tank)]), &[(L23, None)]),
            clip(10, named_tray(&[("B", Role::Tank), ("A", Role::Sniper)]), &[]),
        ];

        assert_eq!(
            replay(clips, &book, &fx),
            vec![Event::Retreat { location: L23 }]
        );
    }

    #[test]
    fn test_extra_newcomers_get_sentinel() {
        let fx = Fixture::new();
        let book = fx.book();
        let clips = vec![
            clip(0, named_tray(&[("A", Role::Sniper), ("B", Role::Tank)]), &[]),
            clip(
                10,
                named_tray(&[("B", Role::Tank)]),
                &[(L23, Some(Direction::Down)), (L41, Some(Direction::Left))],
            ),
        ];

        let events = replay(clips, &book, &fx);
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1],
            Event::Deploy {
                name: UNKNOWN_DEPLOYED.into(),
                location: L41,
                direction: Direction::Left
            }
        );
    }

    #[test]
    fn test_equal_tray_size_emits_nothing() {
        let fx = Fixture::new();
        let book = fx.book();
        let clips = vec![
            clip(0, named_tray(&[("A", Role::Sniper)]), &[]),
            clip(10, named_tray(&[("B", Role::Tank)]), &[(L23, Some(Direction::Up))]),
        ];
        assert!(replay(clips, &book, &fx).is_empty());
    }

    #[test]
    fn test_names_resolved_from_avatars() {
        let fx = Fixture::new();
        let book = fx.book();
        // Unnamed slots carry the tray avatars the book was built from
        let prev_tray = fx.tray();
        let clip_tray = vec![fx.tray().remove(1)];
        let clips = vec![
            clip(0, prev_tray, &[]),
            clip(10, clip_tray, &[(L41, Some(Direction::Up))]),
        ];

        assert_eq!(
            replay(clips, &book, &fx),
            vec![Event::Deploy {
                name: "A".into(),
                location: L41,
                direction: Direction::Up
            }]
        );
    }
}
