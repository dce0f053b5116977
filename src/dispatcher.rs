//! Wake dispatch: decide what this wake is for and do it.

use crate::battery::BatterySampler;
use crate::bma423::MotionSensor;
use crate::clock::Clock;
use crate::display::Surface;
use crate::haptic::Haptic;
use crate::input::{InputSource, TimeSource, WakeCause};
use crate::state::UiMode;
use crate::ui::WatchFace;
use crate::watch::Watch;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WakeAction {
    ColdBoot,
    TickCountdown,
    RedrawWatchFace,
    RedrawMenu,
    HandleButtons,
}

pub fn route(cause: WakeCause, mode: UiMode) -> WakeAction {
    match (cause, mode) {
        (WakeCause::ColdBoot, _) => WakeAction::ColdBoot,
        (WakeCause::ButtonEdge, _) => WakeAction::HandleButtons,
        (WakeCause::TimerAlarm, UiMode::Countdown) => WakeAction::TickCountdown,
        (WakeCause::TimerAlarm, UiMode::WatchFace) => WakeAction::RedrawWatchFace,
        (WakeCause::TimerAlarm, UiMode::MainMenu | UiMode::AppEditing(_)) => {
            WakeAction::RedrawMenu
        }
    }
}

/// Everything one wake does before the power lifecycle takes over.
pub fn run_wake<C, S, I, H, B, M, T, F>(watch: &mut Watch<C, S, I, H, B, M, T, F>)
where
    C: Clock,
    S: Surface,
    I: InputSource,
    H: Haptic,
    B: BatterySampler,
    M: MotionSensor,
    T: TimeSource,
    F: WatchFace,
{
    let cause = watch.input.wake_cause();
    let action = route(cause, watch.state.mode);
    log::info!("wake: {:?} in {:?} -> {:?}", cause, watch.state.mode, action);

    match cause {
        // the alarm that woke us has fired; a new one is armed only if the countdown goes on
        WakeCause::TimerAlarm => watch.state.alarm_armed = false,
        WakeCause::ColdBoot => watch.state.display_full_init = true,
        WakeCause::ButtonEdge => {}
    }

    watch.init_display();

    match action {
        WakeAction::ColdBoot => {
            watch.cold_boot();
            watch.show_watch_face(false);
        }
        WakeAction::TickCountdown => watch.tick_countdown(),
        WakeAction::RedrawWatchFace => watch.show_watch_face(true),
        WakeAction::RedrawMenu => {
            watch.tick_countdown_behind_menu();
            watch.show_menu(true);
        }
        WakeAction::HandleButtons => watch.handle_button_edge(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::App;

    #[test]
    fn alarm_routes_by_mode() {
        assert_eq!(
            route(WakeCause::TimerAlarm, UiMode::Countdown),
            WakeAction::TickCountdown
        );
        assert_eq!(
            route(WakeCause::TimerAlarm, UiMode::WatchFace),
            WakeAction::RedrawWatchFace
        );
        assert_eq!(
            route(WakeCause::TimerAlarm, UiMode::AppEditing(App::SetTime)),
            WakeAction::RedrawMenu
        );
    }

    #[test]
    fn buttons_and_boot_ignore_mode() {
        for mode in [
            UiMode::WatchFace,
            UiMode::Countdown,
            UiMode::MainMenu,
            UiMode::AppEditing(App::SetHourglass),
        ] {
            assert_eq!(route(WakeCause::ButtonEdge, mode), WakeAction::HandleButtons);
            assert_eq!(route(WakeCause::ColdBoot, mode), WakeAction::ColdBoot);
        }
    }
}
