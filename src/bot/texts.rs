//! Canned user-facing replies.

use rand::seq::SliceRandom;

/// Markdown intro sent on `/start`.
pub const INTRO_MESSAGE: &str = "Hello! I'm Savvy, your personal AI assistant. I'm here to help \
answer any questions you may have, just like Google, but better with less noise. Here are a few \
examples of things you can ask me:

- \"What's a simple recipe for tacos?\"
- \"What are some things to see in Kyoto?\"
- \"10 Ideas for a Novel by William Shakespeare\"
- \"How do I change a tire?\"
- \"How do I say 'hello' in Spanish?\"

Don't hesitate to ask me anything!";

/// Follow-up hint sent right after the intro.
pub const VOICE_HINT: &str = "By the way, you can also send a voice message instead of typing.";

/// Fixed notice for an exhausted daily budget. Not retried.
pub const DAILY_LIMIT_REACHED: &str = "\u{1F6A8} This bot is powered by a paid API. Savvy is a \
non-profit project, and we try to limit the number of API calls per day to 10k tokens and 3 \
minutes of voice commands.

\u{1F622} Unfortunately, you have reached your daily limit, please come back tomorrow.
\u{1F49A} Thank you for your understanding!";

/// Fail-closed notice when the usage tracker cannot be reached.
pub const TRACKER_UNAVAILABLE: &str =
    "I can't check your daily usage right now, so I have to sit this one out. \
     Please try again in a minute.";

pub const DIDNT_GET_THAT: &str = "Oops, my bad, I didn't get that. Please try again.";

pub const SOMETHING_WENT_WRONG: &str =
    "Something went wrong on my side. Please try again in a moment.";

pub const UNSUPPORTED_COMMAND: &str = "Sorry, this command is not supported. Please ask me \
anything in text or record a voice message.";

pub const GOODBYE: &str = "Bye! I hope we can talk again some day.";

pub const TRANSCRIBING: &str = "Transcribing voice message...";

const LOADING_MESSAGES: [&str; 10] = [
    "Almost there, just a sec!",
    "Loading...please wait patiently!",
    "Sit tight, we're working hard!",
    "Processing your request, standby!",
    "Don't panic, we're on it!",
    "Just a moment, please!",
    "Hold on, we're coming through!",
    "Be patient, we'll be quick!",
    "Processing...thank you for waiting!",
    "Our elves are working diligently!",
];

/// Pick a random loading message to show while the completion call runs.
pub fn loading_message() -> &'static str {
    LOADING_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(LOADING_MESSAGES[0])
}
