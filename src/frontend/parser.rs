use chumsky::{prelude::*, regex::regex, text::ascii::ident};

use crate::record::{AttrType, CompareOp};

type Extra<'a> = extra::Err<Rich<'a, char>>;

/// `attr op value` in a `WHERE` clause
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub attr: String,
    pub op: CompareOp,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // CREATE TABLE Identifier ( attr_list )
    CreateTable {
        name: String,
        attrs: Vec<(String, AttrType)>,
    },

    // DROP TABLE Identifier
    DropTable(String),

    // OPEN TABLE Identifier
    OpenTable(String),

    // CLOSE TABLE Identifier
    CloseTable(String),

    // ALTER TABLE RENAME Identifier TO Identifier
    RenameTable { old: String, new: String },

    // ALTER TABLE RENAME Identifier COLUMN Identifier TO Identifier
    RenameColumn {
        rel: String,
        old: String,
        new: String,
    },

    // CREATE INDEX ON Identifier . Identifier
    CreateIndex { rel: String, attr: String },

    // DROP INDEX ON Identifier . Identifier
    DropIndex { rel: String, attr: String },

    // INSERT INTO Identifier VALUES ( value_list )
    Insert { rel: String, values: Vec<String> },

    // INSERT INTO Identifier VALUES FROM path
    InsertFromFile { rel: String, path: String },

    // SELECT selectors FROM Identifier INTO Identifier where_clause?
    Select {
        attrs: Option<Vec<String>>,
        src: String,
        target: String,
        condition: Option<Predicate>,
    },

    // SELECT selectors FROM Identifier JOIN Identifier INTO Identifier
    //   WHERE Identifier . Identifier = Identifier . Identifier
    Join {
        attrs: Option<Vec<String>>,
        src1: String,
        src2: String,
        target: String,
        left: (String, String),
        right: (String, String),
    },

    // PRINT TABLE Identifier
    PrintTable(String),

    // EXIT
    Exit,
}

/// A case-insensitive keyword
fn keyword<'a>(word: &'static str) -> impl Parser<'a, &'a str, (), Extra<'a>> {
    ident()
        .try_map(move |s: &str, span| {
            if s.eq_ignore_ascii_case(word) {
                Ok(())
            } else {
                Err(Rich::custom(span, format!("expected {}", word)))
            }
        })
        .padded()
}

fn name<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    ident().map(|s: &str| s.to_string()).padded()
}

/// `rel.attr`
fn qualified<'a>() -> impl Parser<'a, &'a str, (String, String), Extra<'a>> {
    name().then_ignore(just('.')).then(name())
}

fn quoted<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    regex(r#"'[^']*'|"[^"]*""#).map(|s: &str| s[1..s.len() - 1].to_string())
}

fn value<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    let bare = regex(r#"[^,()\s;'"]+"#).map(|s: &str| s.to_string());
    choice((quoted(), bare)).padded()
}

fn path<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    let bare = regex(r"[^\s;]+").map(|s: &str| s.to_string());
    choice((quoted(), bare)).padded()
}

fn operator<'a>() -> impl Parser<'a, &'a str, CompareOp, Extra<'a>> {
    // Two-character operators first so `<=` is not read as `<`
    choice((
        just("<=").to(CompareOp::Le),
        just(">=").to(CompareOp::Ge),
        just("!=").to(CompareOp::Ne),
        just("<>").to(CompareOp::Ne),
        just("=").to(CompareOp::Eq),
        just("<").to(CompareOp::Lt),
        just(">").to(CompareOp::Gt),
    ))
    .padded()
}

fn attr_type<'a>() -> impl Parser<'a, &'a str, AttrType, Extra<'a>> {
    ident()
        .try_map(|s: &str, span| {
            AttrType::from_name(s)
                .ok_or_else(|| Rich::custom(span, format!("unknown attribute type {}", s)))
        })
        .padded()
}

/// `*` or a list of attribute names
fn selectors<'a>() -> impl Parser<'a, &'a str, Option<Vec<String>>, Extra<'a>> {
    choice((
        just('*').padded().to(None),
        name()
            .separated_by(just(',').padded())
            .at_least(1)
            .collect::<Vec<_>>()
            .map(Some),
    ))
}

fn insert_prefix<'a>() -> impl Parser<'a, &'a str, String, Extra<'a>> {
    keyword("INSERT")
        .ignore_then(keyword("INTO"))
        .ignore_then(name())
        .then_ignore(keyword("VALUES"))
}

fn rename_prefix<'a>() -> impl Parser<'a, &'a str, (), Extra<'a>> {
    keyword("ALTER")
        .ignore_then(keyword("TABLE"))
        .ignore_then(keyword("RENAME"))
}

pub fn parser<'a>() -> impl Parser<'a, &'a str, Command, Extra<'a>> {
    let create_table = keyword("CREATE")
        .ignore_then(keyword("TABLE"))
        .ignore_then(name())
        .then(
            name()
                .then(attr_type())
                .separated_by(just(',').padded())
                .at_least(1)
                .collect::<Vec<_>>()
                .delimited_by(just('(').padded(), just(')').padded()),
        )
        .map(|(name, attrs)| Command::CreateTable { name, attrs });

    let drop_table = keyword("DROP")
        .ignore_then(keyword("TABLE"))
        .ignore_then(name())
        .map(Command::DropTable);

    let open_table = keyword("OPEN")
        .ignore_then(keyword("TABLE"))
        .ignore_then(name())
        .map(Command::OpenTable);

    let close_table = keyword("CLOSE")
        .ignore_then(keyword("TABLE"))
        .ignore_then(name())
        .map(Command::CloseTable);

    let rename_column = rename_prefix()
        .ignore_then(name())
        .then_ignore(keyword("COLUMN"))
        .then(name())
        .then_ignore(keyword("TO"))
        .then(name())
        .map(|((rel, old), new)| Command::RenameColumn { rel, old, new });

    let rename_table = rename_prefix()
        .ignore_then(name())
        .then_ignore(keyword("TO"))
        .then(name())
        .map(|(old, new)| Command::RenameTable { old, new });

    let create_index = keyword("CREATE")
        .ignore_then(keyword("INDEX"))
        .ignore_then(keyword("ON"))
        .ignore_then(qualified())
        .map(|(rel, attr)| Command::CreateIndex { rel, attr });

    let drop_index = keyword("DROP")
        .ignore_then(keyword("INDEX"))
        .ignore_then(keyword("ON"))
        .ignore_then(qualified())
        .map(|(rel, attr)| Command::DropIndex { rel, attr });

    let insert_file = insert_prefix()
        .then_ignore(keyword("FROM"))
        .then(path())
        .map(|(rel, path)| Command::InsertFromFile { rel, path });

    let insert_values = insert_prefix()
        .then(
            value()
                .separated_by(just(',').padded())
                .collect::<Vec<_>>()
                .delimited_by(just('(').padded(), just(')').padded()),
        )
        .map(|(rel, values)| Command::Insert { rel, values });

    let condition = keyword("WHERE")
        .ignore_then(name())
        .then(operator())
        .then(value())
        .map(|((attr, op), value)| Predicate { attr, op, value });

    let join = keyword("SELECT")
        .ignore_then(selectors())
        .then_ignore(keyword("FROM"))
        .then(name())
        .then_ignore(keyword("JOIN"))
        .then(name())
        .then_ignore(keyword("INTO"))
        .then(name())
        .then_ignore(keyword("WHERE"))
        .then(qualified())
        .then_ignore(just('=').padded())
        .then(qualified())
        .map(
            |(((((attrs, src1), src2), target), left), right)| Command::Join {
                attrs,
                src1,
                src2,
                target,
                left,
                right,
            },
        );

    let select = keyword("SELECT")
        .ignore_then(selectors())
        .then_ignore(keyword("FROM"))
        .then(name())
        .then_ignore(keyword("INTO"))
        .then(name())
        .then(condition.or_not())
        .map(|(((attrs, src), target), condition)| Command::Select {
            attrs,
            src,
            target,
            condition,
        });

    let print_table = keyword("PRINT")
        .ignore_then(keyword("TABLE"))
        .ignore_then(name())
        .map(Command::PrintTable);

    let exit = keyword("EXIT").to(Command::Exit);

    choice((
        create_table,
        drop_table,
        open_table,
        close_table,
        rename_column,
        rename_table,
        create_index,
        drop_index,
        insert_file,
        insert_values,
        join,
        select,
        print_table,
        exit,
    ))
    .then_ignore(just(';').padded().or_not())
    .then_ignore(end())
}

/// Parse one command line
pub fn parse(input: &str) -> Result<Command, String> {
    parser().parse(input).into_result().map_err(|errs| {
        errs.iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> String {
        text.to_string()
    }

    #[test]
    fn test_create_table() {
        assert_eq!(
            parse("CREATE TABLE Students(Name STR, Age NUM)"),
            Ok(Command::CreateTable {
                name: s("Students"),
                attrs: vec![(s("Name"), AttrType::Str), (s("Age"), AttrType::Number)],
            })
        );
        assert_eq!(
            parse("create table t ( a string );"),
            Ok(Command::CreateTable {
                name: s("t"),
                attrs: vec![(s("a"), AttrType::Str)],
            })
        );
        assert!(parse("CREATE TABLE t(a BLOB)").is_err());
        assert!(parse("CREATE TABLE t()").is_err());
    }

    #[test]
    fn test_table_verbs() {
        assert_eq!(parse("DROP TABLE t"), Ok(Command::DropTable(s("t"))));
        assert_eq!(parse("  open table t ;"), Ok(Command::OpenTable(s("t"))));
        assert_eq!(parse("CLOSE TABLE t"), Ok(Command::CloseTable(s("t"))));
        assert_eq!(parse("PRINT TABLE t"), Ok(Command::PrintTable(s("t"))));
        assert_eq!(parse("exit"), Ok(Command::Exit));
        assert!(parse("OPEN TABLE").is_err());
        assert!(parse("OPEN TABLE a b").is_err());
    }

    #[test]
    fn test_rename() {
        assert_eq!(
            parse("ALTER TABLE RENAME Students TO Pupils"),
            Ok(Command::RenameTable {
                old: s("Students"),
                new: s("Pupils"),
            })
        );
        assert_eq!(
            parse("ALTER TABLE RENAME Students COLUMN Age TO Years"),
            Ok(Command::RenameColumn {
                rel: s("Students"),
                old: s("Age"),
                new: s("Years"),
            })
        );
    }

    #[test]
    fn test_index_verbs() {
        assert_eq!(
            parse("CREATE INDEX ON Students.Age"),
            Ok(Command::CreateIndex {
                rel: s("Students"),
                attr: s("Age"),
            })
        );
        assert_eq!(
            parse("DROP INDEX ON Students . Age"),
            Ok(Command::DropIndex {
                rel: s("Students"),
                attr: s("Age"),
            })
        );
    }

    #[test]
    fn test_insert() {
        assert_eq!(
            parse("INSERT INTO Students VALUES (Alice, 20)"),
            Ok(Command::Insert {
                rel: s("Students"),
                values: vec![s("Alice"), s("20")],
            })
        );
        assert_eq!(
            parse("INSERT INTO Students VALUES ('Mary Ann', -1.5e2)"),
            Ok(Command::Insert {
                rel: s("Students"),
                values: vec![s("Mary Ann"), s("-1.5e2")],
            })
        );
        assert_eq!(
            parse("INSERT INTO Students VALUES FROM data/students.csv"),
            Ok(Command::InsertFromFile {
                rel: s("Students"),
                path: s("data/students.csv"),
            })
        );
        assert_eq!(
            parse("INSERT INTO Students VALUES FROM \"my file.csv\";"),
            Ok(Command::InsertFromFile {
                rel: s("Students"),
                path: s("my file.csv"),
            })
        );
    }

    #[test]
    fn test_select() {
        assert_eq!(
            parse("SELECT * FROM Students INTO Copy"),
            Ok(Command::Select {
                attrs: None,
                src: s("Students"),
                target: s("Copy"),
                condition: None,
            })
        );
        assert_eq!(
            parse("SELECT Name, Age FROM Students INTO Adults WHERE Age >= 18"),
            Ok(Command::Select {
                attrs: Some(vec![s("Name"), s("Age")]),
                src: s("Students"),
                target: s("Adults"),
                condition: Some(Predicate {
                    attr: s("Age"),
                    op: CompareOp::Ge,
                    value: s("18"),
                }),
            })
        );
    }

    #[test]
    fn test_operators() {
        let cases = [
            ("=", CompareOp::Eq),
            ("!=", CompareOp::Ne),
            ("<>", CompareOp::Ne),
            ("<", CompareOp::Lt),
            ("<=", CompareOp::Le),
            (">", CompareOp::Gt),
            (">=", CompareOp::Ge),
        ];
        for (symbol, op) in cases {
            let command = parse(&format!("SELECT * FROM r INTO t WHERE a {} 1", symbol)).unwrap();
            match command {
                Command::Select {
                    condition: Some(predicate),
                    ..
                } => assert_eq!(predicate.op, op, "operator {}", symbol),
                other => panic!("unexpected command {:?}", other),
            }
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(
            parse("SELECT * FROM Students JOIN Marks INTO Report WHERE Students.Name = Marks.Student"),
            Ok(Command::Join {
                attrs: None,
                src1: s("Students"),
                src2: s("Marks"),
                target: s("Report"),
                left: (s("Students"), s("Name")),
                right: (s("Marks"), s("Student")),
            })
        );
        assert_eq!(
            parse("SELECT Name, Score FROM Students JOIN Marks INTO Report WHERE Marks.Student = Students.Name"),
            Ok(Command::Join {
                attrs: Some(vec![s("Name"), s("Score")]),
                src1: s("Students"),
                src2: s("Marks"),
                target: s("Report"),
                left: (s("Marks"), s("Student")),
                right: (s("Students"), s("Name")),
            })
        );
        assert!(parse("SELECT * FROM a JOIN b INTO c WHERE a.x < b.y").is_err());
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("").is_err());
        assert!(parse("SELEC * FROM r INTO t").is_err());
        assert!(parse("DROP TABLE t extra").is_err());
    }
}
