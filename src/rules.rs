use std::collections::{BTreeMap, BTreeSet};

use crate::diagnostics::Anomaly;
use crate::models::{CharaId, StoryId};

/// (event name, chara id) key shared by the per-character tables.
pub type RuleKey = (String, Option<CharaId>);

const EXCLUDED_EVENT_CHARA_NAMES: &[&str] = &[
    "共通", "URA", "アオハル", "クライマックス", "グランドライブ", "グランドマスターズ", "プロジェクトL’Arc", "UAF",
];

const LOW_PRIORITY_CHARA_NAMES: &[&str] = &["チーム＜シリウス＞", "玉座に集いし者たち", "祖にして導く者", "刻み続ける者たち"];

// Contain katakana but must not be cut down to it.
const KATAKANA_WHITELIST: &[&str] = &["佐岳メイ"];

const EXCLUDED_EVENT_NAMES: &[&str] = &[
    "追加の自主トレ", "夏合宿（2年目）にて", "夏合宿(2年目)にて", "初詣", "新年の抱負",
    "お大事に！", "無茶は厳禁！",
    "レース勝利！(1着)", "レース入着(2~5着)", "レース敗北(6着以下)", "レース勝利！", "レース入着", "レース敗北",
    "今度こそ負けない！",
    "あんし〜ん笹針師、参☆上",
    "チーム＜ファースト＞の宣戦布告", "ついに集まったチームメンバー！", // Aoharu only
];

const EVENT_NAME_SUFFIXES: &[&str] = &[
    "（お出かけ2）", "（お出かけ3）", "（Rお出かけ3）", "（パリの街にて）", "（その日を信じて）", "（温かなメッセージ）", "（彼の都の思い出は）",
];

const PUNCTUATION_SUBSTITUTIONS: &[(char, char)] = &[('･', '・'), ('~', '～'), ('(', '（'), (')', '）')];

const PER_CHARA_EXCLUDE_EVENTS: &[(&str, CharaId)] = &[
    ("夏合宿(3年目)終了", 1007), // ゴルシ, wrong name, the only choice does nothing
    ("レース勝利", 1024),        // マヤノ, both this and the "！" one are in the gallery
    ("レース入着(2/4/5着)", 1060), // ナイスネイチャ
    ("天皇賞(秋)の後に・空に手を", 1069), // サクラチヨノオー
    // ゴールドシチー
    ("レース勝利！(クラシック10月後半以前1着)", 1040),
    ("レース入着(クラシック10月後半以前2~5着)", 1040),
    ("レース敗北(クラシック10月後半以前6着以下)", 1040),
    ("レース勝利！(クラシック11月前半以降1着)", 1040),
    ("レース入着(クラシック11月前半以降2~5着)", 1040),
    ("レース敗北(クラシック11月前半以降6着以下)", 1040),
    ("レース勝利！(シニア5月前半以降1着)", 1040),
    ("レース入着(シニア5月前半以降2~5着)", 1040),
    ("レース敗北(シニア5月前半以降6着以下)", 1040),
];

const PERMITTED_DUPLICATED_EVENTS: &[(&str, Option<CharaId>, &[StoryId])] = &[
    // 理事長. Only one of them has choices.
    ("上々の面構えッ！", None, &[400001024, 400001037]),
    // ダイワスカーレット ☆2 / ☆3
    ("アイツの存在", Some(1009), &[501009115, 501009413]),
    // ゴルドシップ ☆2 / ☆3, with and without the 宝塚二連覇 choice
    ("宝塚記念の後に・キーワード②", Some(1007), &[501007309, 501007310, 501007423, 501007424]),
    ("岐", Some(1016), &[501016121, 501016409]),
    ("第一幕　スマイル", Some(1005), &[501005113, 501005401]),
    ("Who Will Escort Me?", Some(1022), &[501022118, 501022406]),
    ("道、分かたれて", Some(1071), &[501071116, 501071404]),
    // ニシノフラワー. Two consecutive events upstream merges into one.
    ("夜に咲く想い", Some(1051), &[501051524, 501051525]),
    ("高架下の捜索", Some(1093), &[501093524, 501093525]),
    ("Sisters♡", Some(1091), &[501091117, 501091118, 501091405, 501091406]),
    // [一天地六に身を任せ]ナカヤマフェスタ
    ("デスパレートに輝いて", Some(1049), &[830108003, 830108004]),
    // Aoharu team name
    ("ついに集まったチームメンバー！", None, &[400002204, 400002217, 400002444]),
    ("あなたと私をつなげるライブ", None, &[400003202, 400003231]),
    ("今を駆ける者たちの祖", None, &[400005105, 400005430]),
    ("With", None, &[400006005, 400006404]),
];

const DUPLICATED_EVENTS_DEDUPE: &[(&str, Option<CharaId>, &[StoryId], &[StoryId])] = &[
    // 1061 キングヘイロー vs 1019 アグネスデジタル
    ("一流の条件", Some(1061), &[501019116, 501061704], &[501061704]),
    // 1021 タマモクロス vs 1024 マヤノトップガン (excluded above); タマ's is the バ群 one
    ("レース勝利", Some(1021), &[501021734, 501024724], &[501021734]),
    // 1077 ナリタトップロード vs [まだ小さな蕾でも]ニシノフラワー
    ("私にできること", Some(1077), &[501077513, 830018001], &[501077513]),
    // [ふわり、さらり]メジロドーベル vs [この先も！]刻み続ける者たち
    ("頼れる先輩", Some(1059), &[820057001, 830180005], &[820057001]),
];

const KNOWN_OVERRIDES: &[(&str, Option<CharaId>, &str)] = &[
    ("秋川理事長のご褒美！", None, "ついに集まったチームメンバー！"), // Aoharu, show the outcome where the choice happens
    ("女帝vs.\"帝王\"", Some(1003), "“女帝”vs.“帝王”"),
    ("支えあいの秘訣", Some(1004), "支え合いの秘訣"),
    ("えっアタシのバイト…やばすぎ？", Some(1007), "えっアタシのバイト……ヤバすぎ？"),
    ("挑め、”宿命”", Some(1008), "挑め、“宿命”"),
    ("楽しめ！一番！", Some(1009), "楽しめ！　1番！"),
    ("女帝と\"帝王\"", Some(1018), "“女帝”と“帝王”"),
    ("女帝と\"皇帝\"", Some(1018), "“女帝”と“皇帝”"),
    ("ラスボスはスペ", Some(1052), "ラスボスはスぺ"), // ぺ is hiragana in master.mdb
    ("スペの緊急牧場ガイド", Some(1001), "スぺの緊急牧場ガイド"),
    ("覇王として", Some(1015), "“覇王”として"),
    ("麗姿、瞳に焼き付いて", Some(1018), "麗姿、瞳に焼きついて"),
    ("すべてはーーーのため", Some(1038), "すべては――のため"),
    ("You’re My Sunshine☆", Some(1024), "You're My Sunshine☆"),
    ("With My Whole Heart!", Some(1024), "With My Whole Heart！"),
    ("甦れ！ゴルシ印のソース焼きそば！", Some(1007), "甦れ！　ゴルシ印のソース焼きそば！"),
    ("08:36/朝寝坊、やばっ", Some(1040), "08:36／朝寝坊、やばっ"),
    ("ヒシアマ姐さん奮闘記～問題児編～", Some(1012), "ヒシアマ姐さん奮闘記　～問題児編～"),
    ("シチースポットを目指して", Some(1029), "“シチースポット”を目指して"),
    ("信仰心と親切心が交わる時ーー", Some(1056), "信仰心と親切心が交わる時――"),
    ("13:12/昼休み、気合い入れなきゃ", Some(1040), "13:12／昼休み、気合い入れなきゃ"),
    ("ヒシアマ姐さん奮闘記～追い込み編～", Some(1012), "ヒシアマ姐さん奮闘記　～追い込み編～"),
    ("オゥ！トゥナイト・パーティー☆", Some(1010), "オゥ！　トゥナイト・パーティー☆"),
    ("皇帝の激励", Some(1017), "“皇帝”の激励"),
    ("皇帝の激励", None, "“皇帝”の激励"), // [尊尚親愛]玉座に集いし者たち, same story 801017001
    ("#lol #Party! #2nd", Some(1065), "#lol #Party!! #2nd"),
    ("検証〜ネコ語は実在するのか？", Some(1020), "検証～ネコ語は実在するのか？"),
    ("＠DREAM_MAKER", Some(1005), "@DREAM_MAKER"),
    ("人生最大の幸運とは", Some(1005), "人生最大の幸福とは"),
    ("What a wonderful stage!", Some(1005), "What a wonderful stage！"),
    ("あんしんかばん", Some(1058), "あんしんカバン"),
    ("奏でようWINNING!", Some(1002), "奏でようWINNING！"),
    ("推しえて、デジタル先生！", Some(1019), "“推し”えて、デジタル先生！"),
    ("あなたの背中を\"推し\"たくて……", Some(1019), "あなたの背中を“推し”たくて……"),
    ("推しみない愛を推しに！", Some(1019), "“推し”みない愛を推しに！"),
    ("Search  or Mommy", Some(1045), "Search or Mommy"),
    ("シチーガールの今の気分♪", Some(1040), "“シチーガール”の今の気分♪"),
    ("言葉+……", Some(1033), "言葉＋……"),
    ("”我が弟子”へ", Some(1072), "“我が弟子”へ"),
    ("常に、誰かの”師”たれ", Some(1072), "常に、誰かの“師”たれ"),
    ("”允許”の重み", Some(1072), "“允許”の重み"),
    ("成るか成らぬか”不動心”", Some(1072), "成るか成らぬか“不動心”"),
    ("Currens Black", Some(1038), "Curren's Black"),
    ("教訓之二:決して撮影を諦めるな", Some(1010), "教訓之二：決して撮影を諦めるな"),
    ("チケゾ―配達日記〜蒸気編〜", Some(1035), "チケゾー配達日記～蒸気編～"),
    ("チケゾ―配達日記〜学園編〜", Some(1035), "チケゾー配達日記～学園編～"),
    ("クエスト:撤去作業のお手伝い！", Some(1050), "クエスト：撤去作業のお手伝い！"),
    ("クエスト:演劇部のお手伝い！", Some(1050), "クエスト：演劇部のお手伝い！"),
    ("\"シチーガール\"になるために", Some(1029), "“シチーガール”になるために"),
    ("てきぱき&のびのび", Some(1100), "てきぱき＆のびのび"),
    ("悪童、あくなき探究へ", Some(1043), "悪童、あくなき探求へ"),
    ("追いつ追われつ（チェイス）は上等", Some(1094), "“追いつ追われつ”（チェイス）は上等"),
    ("闘叫（トーキョー）の鬼", Some(1094), "“闘叫”（トーキョー）の鬼"),
    ("魔術（マジック）みてぇに", Some(1094), "“魔術”（マジック）みてぇに"),
    ("誠心誠意、感謝を込めて", Some(1063), "誠心誠意、感謝をこめて"),
    ("”ロマン”を求めて！", Some(1107), "“ロマン”を求めて！"),
    ("掴め、ビッグドリーム！", Some(1107), "掴め、ビッグ・ドリーム！"),
    ("メジロ’s バックアップ！", Some(1064), "メジロ's バックアップ！"),
    ("See Ya！　夢追う友人", Some(1107), "See Ya!　夢追う友人"),
    ("コン・フォーコなアモーレを君に", Some(1102), "コン・フオーコなアモーレを君に"),
    ("アタシだって―—", Some(1059), "アタシだって――"),
    ("Vol.2『脈々と』", Some(1108), "Vol.2 『脈々と』"),
    ("都会で、『おあげんしぇ』！", Some(1029), "都会で『おあげんしぇ』！"),
    ("秘密の\"れっすん\"！", Some(1029), "秘密の“れっすん”！"),
    ("巨大ピコーペガサスVSガブガブ大怪獣", Some(1054), "巨大ビコーペガサスVSガブガブ大怪獣"),
    ("”最強”と”女帝”", Some(1108), "“最強”と“女帝”"),
    ("お疲れさまです……！", Some(9008), "お疲れ様です……！"),
    ("『全力』&『普通』ダイエット！", None, "『全力』＆『普通』ダイエット！"),
    ("あなたと私を繋げるライブ", None, "あなたと私をつなげるライブ"),
];

/// Story ids whose text starts with one of these followed by the chara id
/// belong to that character (50: chara story, 80: card story).
const CHARA_STORY_PREFIXES: &[&str] = &["50", "80"];

/// An event name that is shared by every character and resolved by building
/// the id `{prefix}{chara_id}{suffix}` instead of a table lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecialCase {
    pub event_name: String,
    pub prefix: String,
    pub suffix: String,
}

impl SpecialCase {
    pub fn story_id_for(&self, chara_id: CharaId) -> Option<StoryId> {
        format!("{}{}{}", self.prefix, chara_id, self.suffix).parse().ok()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupeRule {
    pub expected: BTreeSet<StoryId>,
    pub keep: Vec<StoryId>,
}

/// All static configuration of a run. Built once, never mutated.
///
/// Everything the matcher cannot infer from the data lives here as plain
/// literals: events to drop, renames for upstream labels that differ from
/// `master.mdb`, and the ambiguous lookups that are expected. When
/// `master.mdb` changes shape these tables start producing warnings and need a
/// manual update.
#[derive(Debug, Clone, Default)]
pub struct RuleTables {
    pub excluded_chara_names: BTreeSet<String>,
    pub low_priority_chara_names: BTreeSet<String>,
    pub katakana_whitelist: BTreeSet<String>,
    pub excluded_event_names: BTreeSet<String>,
    pub per_chara_excluded_events: BTreeSet<RuleKey>,
    pub event_name_suffixes: Vec<String>,
    pub punctuation_substitutions: Vec<(char, char)>,
    pub overrides: BTreeMap<RuleKey, String>,
    pub permitted_duplicates: BTreeMap<RuleKey, BTreeSet<StoryId>>,
    pub dedupe: BTreeMap<RuleKey, DedupeRule>,
    pub chara_story_prefixes: Vec<String>,
    pub special_cases: Vec<SpecialCase>,
}

fn strings(xs: &[&str]) -> BTreeSet<String> {
    xs.iter().map(|s| s.to_string()).collect()
}

impl RuleTables {
    /// The tables tuned against the current `master.mdb`.
    pub fn builtin() -> Self {
        RuleTables {
            excluded_chara_names: strings(EXCLUDED_EVENT_CHARA_NAMES),
            low_priority_chara_names: strings(LOW_PRIORITY_CHARA_NAMES),
            katakana_whitelist: strings(KATAKANA_WHITELIST),
            excluded_event_names: strings(EXCLUDED_EVENT_NAMES),
            per_chara_excluded_events: PER_CHARA_EXCLUDE_EVENTS
                .iter()
                .map(|&(name, id)| (name.to_string(), Some(id)))
                .collect(),
            event_name_suffixes: EVENT_NAME_SUFFIXES.iter().map(|s| s.to_string()).collect(),
            punctuation_substitutions: PUNCTUATION_SUBSTITUTIONS.to_vec(),
            overrides: KNOWN_OVERRIDES
                .iter()
                .map(|&(from, id, to)| ((from.to_string(), id), to.to_string()))
                .collect(),
            permitted_duplicates: PERMITTED_DUPLICATED_EVENTS
                .iter()
                .map(|&(name, id, ids)| ((name.to_string(), id), ids.iter().copied().collect()))
                .collect(),
            dedupe: DUPLICATED_EVENTS_DEDUPE
                .iter()
                .map(|&(name, id, expected, keep)| {
                    (
                        (name.to_string(), id),
                        DedupeRule { expected: expected.iter().copied().collect(), keep: keep.to_vec() },
                    )
                })
                .collect(),
            chara_story_prefixes: CHARA_STORY_PREFIXES.iter().map(|s| s.to_string()).collect(),
            special_cases: vec![SpecialCase {
                event_name: "ダンスレッスン".to_string(),
                prefix: "50".to_string(),
                suffix: "506".to_string(),
            }],
        }
    }

    /// Exclusion filter, applied to the NFC event name before any normalization.
    pub fn is_excluded(&self, event_name: &str, chara_id: Option<CharaId>) -> bool {
        self.excluded_event_names.contains(event_name)
            || self.per_chara_excluded_events.contains(&(event_name.to_string(), chara_id))
    }

    pub fn is_low_priority(&self, chara_name: &str) -> bool {
        self.low_priority_chara_names.contains(chara_name)
    }

    /// Punctuation unification plus suffix stripping.
    pub fn normalize_event_name(&self, name: &str) -> String {
        let mut out: String = name
            .chars()
            .map(|c| {
                self.punctuation_substitutions
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map_or(c, |&(_, to)| to)
            })
            .collect();
        for suffix in &self.event_name_suffixes {
            if let Some(stripped) = out.strip_suffix(suffix.as_str()) {
                out = stripped.to_string();
            }
        }
        out
    }

    /// Whether `story_id` is namespaced under `chara_id`.
    pub fn story_belongs_to(&self, story_id: StoryId, chara_id: CharaId) -> bool {
        let id = story_id.to_string();
        self.chara_story_prefixes
            .iter()
            .any(|p| id.starts_with(&format!("{}{}", p, chara_id)))
    }

    /// Configuration errors that the data never exercises but the tables could drift into.
    pub fn validate(&self) -> Vec<Anomaly> {
        let mut out = Vec::new();
        for (key, rule) in &self.dedupe {
            if self.permitted_duplicates.contains_key(key) {
                out.push(Anomaly::RuleConflict {
                    key: key.clone(),
                    detail: "key is both a permitted duplicate and a dedupe rule".to_string(),
                });
            }
            if rule.keep.is_empty() || rule.keep.iter().any(|id| !rule.expected.contains(id)) {
                out.push(Anomaly::RuleConflict {
                    key: key.clone(),
                    detail: format!("dedupe keeps {:?}, not a non-empty subset of {:?}", rule.keep, rule.expected),
                });
            }
        }
        out
    }
}
