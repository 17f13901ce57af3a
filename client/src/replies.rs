//! Canned rule-based replies for the demo chat.

use rand::Rng;
use rand::seq::SliceRandom;

const ECHO_LIMIT: usize = 24;

struct ReplyRule {
    words: &'static [&'static str],
    replies: &'static [&'static str],
}

const RULES: [ReplyRule; 8] = [
    ReplyRule {
        words: &["고마워", "thanks", "thx"],
        replies: &["에헤헤~ 천만에!", "별말을~ 도움이 되면 나도 좋아!", "언제든지 불러줘!"],
    },
    ReplyRule {
        words: &["미안", "sorry"],
        replies: &["괜찮아 괜찮아~", "에이 괜찮지!", "신경 쓰지 마~"],
    },
    ReplyRule {
        words: &["피곤", "졸려", "잠", "sleep"],
        replies: &[
            "으앙… 나도 살짝 졸려… 같이 쉬었다 할까?",
            "따뜻한 물 한 잔 어때?",
            "잠깐 스트레칭하고 올래?",
        ],
    },
    ReplyRule {
        words: &["이름", "누구", "정체", "who are you"],
        replies: &[
            "나는 데모 아바타야! 아직은 간단한 규칙 기반이지만, 점점 똑똑해질지도?",
            "나는 화면 속에 사는 작은 아바타~ 편하게 불러줘!",
        ],
    },
    ReplyRule {
        words: &["사랑", "좋아해", "보고싶", "love you"],
        replies: &[
            "에엣… 갑자기 그런 말 하면 부끄럽잖아…",
            "나도 너 좋아~! (소곤소곤)",
            "으아아… 심장 두근…!",
        ],
    },
    ReplyRule {
        words: &["배고", "밥", "먹을", "간식", "치킨", "떡볶이"],
        replies: &[
            "간식 타임! 뭐 먹고 싶어? 난 달달한 거 땡겨~",
            "배고프면 집중 안 돼! 같이 뭐 먹자",
            "치킨…? 나도 한 입만…!",
        ],
    },
    ReplyRule {
        words: &["공부", "숙제", "시험", "과제"],
        replies: &[
            "공부는 싫지만… 같이 하면 할 만해! 25분 집중하고 5분 쉬자!",
            "오케이, 오늘 목표 딱 하나만 정해볼래?",
            "시험이면 컨디션이 제일 중요해. 물 마시고!",
        ],
    },
    ReplyRule {
        words: &["ㅋㅋ", "ㅎㅎ", "lol", "귀엽", "웃겨"],
        replies: &["ㅋㅋㅋ 그치? 나도 웃겨!", "에헤헤~ 나도 빵 터졌어!", "앗 부끄럽다…"],
    },
];

const GREETING_REPLIES: [&str; 3] = [
    "안녕! 오늘 기분 어때?",
    "하이하이~ 나 왔어! 뭐 할까?",
    "안뇽! 만나서 반가워~",
];

const QUESTION_REPLIES: [&str; 3] = [
    "음… 내 생각엔 이렇게 해보는 게 좋을 것 같아!",
    "그거 좋은 질문이야. 한 번 같이 정리해볼까?",
    "잠깐만… 머리 굴리는 중…",
];

const QUESTION_WORDS: [&str; 4] = ["왜", "어떻게", "뭐야", "어떤"];

pub const OPENING_LINES: [&str; 3] = [
    "안녕~ 오늘도 만나서 반가워!",
    "하이하이! 놀러왔어?",
    "안뇽! 뭐 얘기해볼까?",
];

pub const HINT_LINE: &str = "예시: \"안녕\" / \"오늘 뭐해?\" / \"ㅋㅋ\" / \"피곤해\" 같은 말도 좋아!";

fn pick<R: Rng>(rng: &mut R, choices: &[&str]) -> String {
    choices.choose(rng).copied().unwrap_or_default().to_string()
}

pub fn make_reply<R: Rng>(text: &str, rng: &mut R) -> String {
    let text = text.trim();
    if text.is_empty() {
        return "응? 다시 한 번 말해줄래?".to_string();
    }

    if avatar::reaction::is_greeting(text) {
        return pick(rng, &GREETING_REPLIES);
    }

    let lower = text.to_lowercase();
    if let Some(rule) = RULES
        .iter()
        .find(|rule| rule.words.iter().any(|word| lower.contains(word)))
    {
        return pick(rng, rule.replies);
    }

    if text.ends_with(['?', '？']) || QUESTION_WORDS.iter().any(|word| text.contains(word)) {
        return pick(rng, &QUESTION_REPLIES);
    }

    let echo = if text.chars().count() > ECHO_LIMIT {
        let head: String = text.chars().take(ECHO_LIMIT).collect();
        format!("{head}…")
    } else {
        text.to_string()
    };
    let fallbacks = [
        format!("응응, \"{echo}\" 맞지? 나도 그렇게 느껴! 그럼 너는 어떤 점이 제일 마음에 들어?"),
        format!("오케이! \"{echo}\" 메모해둘게~ 다음으로 뭐부터 해볼까?"),
        "좋아! 그럼 다음은 뭐 해볼까? 갑자기 궁금한 거 있어?".to_string(),
    ];
    let index = rng.gen_range(0..fallbacks.len());
    fallbacks[index].clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn rules_are_checked_in_order() {
        let mut rng = StdRng::seed_from_u64(3);
        assert!(GREETING_REPLIES.contains(&make_reply("안녕 반가워", &mut rng).as_str()));
        assert!(RULES[0].replies.contains(&make_reply("정말 고마워", &mut rng).as_str()));
        assert!(QUESTION_REPLIES.contains(&make_reply("오늘 뭐해?", &mut rng).as_str()));
        assert_eq!(make_reply("   ", &mut rng), "응? 다시 한 번 말해줄래?");
    }

    #[test]
    fn long_messages_are_echoed_truncated() {
        let mut rng = StdRng::seed_from_u64(0);
        let text = "가".repeat(40);
        for _ in 0..10 {
            let reply = make_reply(&text, &mut rng);
            assert!(!reply.contains(&text));
        }
    }
}
