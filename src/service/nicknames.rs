//! Nickname and relationship vocabularies used by the recipient matcher.

use std::collections::HashMap;
use std::sync::LazyLock;

/// Nickname → formal first name.
#[rustfmt::skip]
const NICKNAME_TO_FORMAL: &[(&str, &str)] = &[
    ("abe", "abraham"), ("al", "albert"), ("alex", "alexander"), ("allie", "allison"),
    ("andy", "andrew"), ("angie", "angela"), ("annie", "anne"), ("ari", "ariel"),
    ("art", "arthur"), ("barb", "barbara"), ("bart", "bartholomew"), ("bea", "beatrice"),
    ("becca", "rebecca"), ("becky", "rebecca"), ("ben", "benjamin"), ("benny", "benjamin"),
    ("bert", "albert"), ("beth", "elizabeth"), ("betty", "elizabeth"), ("bev", "beverly"),
    ("bill", "william"), ("billy", "william"), ("bob", "robert"), ("bobby", "robert"),
    ("brad", "bradley"), ("bri", "brianna"), ("brit", "brittany"), ("cal", "calvin"),
    ("cam", "cameron"), ("carly", "caroline"), ("carol", "caroline"), ("carrie", "caroline"),
    ("cass", "cassandra"), ("cassie", "cassandra"), ("cat", "catherine"), ("cate", "catherine"),
    ("cath", "catherine"), ("cathy", "catherine"), ("chad", "chadwick"), ("charlie", "charles"),
    ("chaz", "charles"), ("chip", "charles"), ("chris", "christopher"), ("christie", "christine"),
    ("christy", "christine"), ("chuck", "charles"), ("cindy", "cynthia"), ("cj", "christopher"),
    ("connie", "constance"), ("daf", "dafydd"), ("dan", "daniel"), ("danny", "daniel"),
    ("dave", "david"), ("davy", "david"), ("deb", "deborah"), ("debbie", "deborah"),
    ("dee", "diana"), ("del", "delores"), ("dex", "dexter"), ("di", "diana"),
    ("dick", "richard"), ("dina", "deanna"), ("don", "donald"), ("donna", "madonna"),
    ("donnie", "donald"), ("dottie", "dorothy"), ("doug", "douglas"), ("drew", "andrew"),
    ("ed", "edward"), ("eddie", "edward"), ("eddy", "edward"), ("eli", "elijah"),
    ("eliza", "elizabeth"), ("ellie", "eleanor"), ("em", "emily"), ("emma", "emily"),
    ("emmy", "emily"), ("eric", "frederick"), ("ernie", "ernest"), ("evie", "evelyn"),
    ("fanny", "frances"), ("flo", "florence"), ("fran", "frances"), ("frank", "francis"),
    ("frankie", "francis"), ("fred", "frederick"), ("freddie", "frederick"), ("fritz", "frederick"),
    ("gabe", "gabriel"), ("gail", "abigail"), ("gene", "eugene"), ("gerry", "gerald"),
    ("gil", "gilbert"), ("gina", "regina"), ("ginny", "virginia"), ("greg", "gregory"),
    ("gus", "augustus"), ("hank", "henry"), ("harry", "harold"), ("helen", "helena"),
    ("ike", "isaac"), ("izzy", "isabella"), ("jack", "john"), ("jackie", "jacqueline"),
    ("jake", "jacob"), ("jamie", "james"), ("jan", "janet"), ("jane", "janet"),
    ("jay", "jason"), ("jaz", "jasmine"), ("jazz", "jasmine"), ("jb", "john"),
    ("jd", "john"), ("jeff", "jeffrey"), ("jen", "jennifer"), ("jenna", "jennifer"),
    ("jenny", "jennifer"), ("jer", "jeremy"), ("jerry", "gerald"), ("jess", "jessica"),
    ("jessie", "jessica"), ("jim", "james"), ("jimmy", "james"), ("jo", "joanne"),
    ("joe", "joseph"), ("joey", "joseph"), ("jon", "jonathan"), ("josh", "joshua"),
    ("jude", "judith"), ("judy", "judith"), ("jules", "julia"), ("julie", "julia"),
    ("kat", "katherine"), ("kate", "katherine"), ("kath", "katherine"), ("katie", "katherine"),
    ("kathy", "katherine"), ("kay", "katherine"), ("ken", "kenneth"), ("kenny", "kenneth"),
    ("kev", "kevin"), ("kim", "kimberly"), ("kit", "katherine"), ("kitty", "katherine"),
    ("kris", "kristina"), ("krissy", "kristina"), ("larry", "lawrence"), ("laura", "laurence"),
    ("laurie", "laurence"), ("len", "leonard"), ("lenny", "leonard"), ("leo", "leonard"),
    ("les", "leslie"), ("lester", "leslie"), ("lew", "lewis"), ("lex", "alexander"),
    ("liam", "william"), ("lib", "elizabeth"), ("libby", "elizabeth"), ("lil", "lillian"),
    ("lilly", "lillian"), ("linda", "melinda"), ("liz", "elizabeth"), ("liza", "elizabeth"),
    ("lizzie", "elizabeth"), ("lizzy", "elizabeth"), ("lou", "louise"), ("louie", "louis"),
    ("luce", "lucy"), ("lucy", "lucille"), ("luke", "lucas"), ("mac", "mackenzie"),
    ("maddie", "madeline"), ("maddy", "madeline"), ("mag", "margaret"), ("maggie", "margaret"),
    ("mandy", "amanda"), ("marc", "marcus"), ("marcy", "marcia"), ("marge", "margaret"),
    ("margie", "margaret"), ("marty", "martin"), ("mat", "matthew"), ("matt", "matthew"),
    ("matty", "matthew"), ("max", "maxwell"), ("maxie", "maxwell"), ("meg", "margaret"),
    ("mel", "melissa"), ("mia", "maria"), ("mick", "michael"), ("mickey", "michael"),
    ("mike", "michael"), ("mikey", "michael"), ("milly", "mildred"), ("mindy", "melinda"),
    ("minnie", "minerva"), ("missy", "melissa"), ("mitch", "mitchell"), ("mo", "maureen"),
    ("molly", "mary"), ("monty", "montgomery"), ("nan", "nancy"), ("nance", "nancy"),
    ("nancy", "anne"), ("nat", "nathan"), ("natalie", "natalya"), ("nate", "nathan"),
    ("ned", "edward"), ("nell", "eleanor"), ("nelly", "eleanor"), ("nick", "nicholas"),
    ("nicky", "nicholas"), ("nina", "antonina"), ("nora", "eleanor"), ("ollie", "oliver"),
    ("pat", "patricia"), ("patsy", "patricia"), ("patty", "patricia"), ("peg", "margaret"),
    ("peggy", "margaret"), ("penny", "penelope"), ("pete", "peter"), ("phil", "philip"),
    ("polly", "mary"), ("randy", "randall"), ("ray", "raymond"), ("ree", "marie"),
    ("reg", "reginald"), ("rich", "richard"), ("richie", "richard"), ("rick", "richard"),
    ("ricky", "richard"), ("rob", "robert"), ("robbie", "robert"), ("rocky", "rockwell"),
    ("rod", "rodney"), ("roger", "rodger"), ("ron", "ronald"), ("ronnie", "ronald"),
    ("rosie", "rose"), ("roxy", "roxanne"), ("roy", "leroy"), ("russ", "russell"),
    ("sal", "salvador"), ("sally", "sarah"), ("sam", "samuel"), ("sammie", "samantha"),
    ("sammy", "samuel"), ("sandy", "sandra"), ("sara", "sarah"), ("sasha", "alexander"),
    ("scott", "prescott"), ("sean", "john"), ("shawn", "shawna"), ("shelly", "michelle"),
    ("sheri", "sheryl"), ("sherry", "sheryl"), ("sid", "sidney"), ("sly", "sylvester"),
    ("stacy", "anastasia"), ("stan", "stanley"), ("steve", "stephen"), ("stevie", "stephen"),
    ("stu", "stuart"), ("sue", "susan"), ("suzie", "susan"), ("suzy", "susan"),
    ("syd", "sydney"), ("tam", "tamara"), ("tammy", "tamara"), ("ted", "theodore"),
    ("teddy", "theodore"), ("terri", "teresa"), ("terry", "terence"), ("tess", "teresa"),
    ("theo", "theodore"), ("tia", "tiana"), ("tiff", "tiffany"), ("tim", "timothy"),
    ("timmy", "timothy"), ("tina", "christina"), ("toby", "tobias"), ("tom", "thomas"),
    ("tommy", "thomas"), ("tony", "anthony"), ("tori", "victoria"), ("tracey", "teresa"),
    ("tracy", "teresa"), ("trey", "terrence"), ("trina", "catherine"), ("trish", "patricia"),
    ("trisha", "patricia"), ("val", "valentine"), ("vicky", "victoria"), ("vinnie", "vincent"),
    ("vinny", "vincent"), ("walt", "walter"), ("will", "william"), ("willie", "william"),
    ("willy", "william"), ("zach", "zachary"), ("zack", "zachary"), ("zee", "zelda"),
];

static NICKNAMES: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| NICKNAME_TO_FORMAL.iter().copied().collect());

/// Canonical relationship → casual terms. Order matters: the first list
/// containing a term wins ("papa" resolves to father).
const RELATIONSHIP_SYNONYMS: &[(&str, &[&str])] = &[
    ("mother", &["mom", "mama", "mommy", "ma", "mum", "mummy", "mother"]),
    ("father", &["dad", "daddy", "papa", "pa", "pop", "father", "pops"]),
    ("sister", &["sis", "sister", "sissy"]),
    ("brother", &["bro", "brother", "bruh"]),
    (
        "grandmother",
        &["grandma", "granny", "nana", "nanna", "gram", "grammy", "grandmother", "gma"],
    ),
    ("grandfather", &["grandpa", "gramps", "papa", "pap", "grandfather", "gpa"]),
    ("wife", &["wife", "spouse", "partner", "wifey"]),
    ("husband", &["husband", "spouse", "partner", "hubby"]),
    ("daughter", &["daughter"]),
    ("son", &["son", "boy"]),
    ("aunt", &["aunt", "auntie", "aunty"]),
    ("uncle", &["uncle"]),
    ("cousin", &["cousin", "cuz"]),
    ("niece", &["niece"]),
    ("nephew", &["nephew"]),
    ("friend", &["friend", "buddy", "pal", "bestie", "bff"]),
];

/// Formal name for a nickname, or the input unchanged.
pub fn formal_name(nickname: &str) -> String {
    let key = nickname.trim().to_lowercase();
    match NICKNAMES.get(key.as_str()) {
        Some(formal) => (*formal).to_string(),
        None => nickname.to_string(),
    }
}

pub fn is_nickname(name: &str) -> bool {
    NICKNAMES.contains_key(name.trim().to_lowercase().as_str())
}

/// Canonical relationship for a casual term (`"mom"` → `"mother"`).
pub fn normalize_relationship(term: &str) -> Option<&'static str> {
    let term = term.trim().to_lowercase();
    RELATIONSHIP_SYNONYMS
        .iter()
        .find(|(_, synonyms)| synonyms.contains(&term.as_str()))
        .map(|(formal, _)| *formal)
}

pub fn is_relationship_term(term: &str) -> bool {
    normalize_relationship(term).is_some()
}

/// All nicknames mapping to `formal`.
pub fn nicknames_for(formal: &str) -> Vec<&'static str> {
    let formal = formal.trim().to_lowercase();
    NICKNAME_TO_FORMAL
        .iter()
        .filter(|(_, f)| *f == formal)
        .map(|(n, _)| *n)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nickname_lookup() {
        assert_eq!(formal_name("Liz"), "elizabeth");
        assert_eq!(formal_name("mike"), "michael");
        assert_eq!(formal_name("Unknown"), "Unknown");
        assert!(is_nickname("BOBBY"));
        assert!(!is_nickname("elizabeth"));
    }

    #[test]
    fn relationship_synonyms() {
        assert_eq!(normalize_relationship("Mom"), Some("mother"));
        assert_eq!(normalize_relationship("grandpa"), Some("grandfather"));
        assert_eq!(normalize_relationship("papa"), Some("father"));
        assert_eq!(normalize_relationship("partner"), Some("wife"));
        assert!(!is_relationship_term("sarah"));
    }

    #[test]
    fn reverse_lookup() {
        let nicks = nicknames_for("Elizabeth");
        for n in ["beth", "betty", "liz", "lizzie", "libby"] {
            assert!(nicks.contains(&n), "missing {n}");
        }
    }
}
