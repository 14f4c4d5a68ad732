//! Version 46: add `started` to `milestone`.

pub(super) const SQL: &[&str] = &[
    "CREATE TEMPORARY TABLE milestone_old AS SELECT * FROM milestone;",
    "DROP TABLE milestone;",
    "CREATE TABLE milestone (\n\
     \tname\ttext,\n\
     \tdue\tinteger,\n\
     \tstarted\tinteger,\n\
     \tcompleted\tinteger,\n\
     \tdescription\ttext,\n\
     \tPRIMARY KEY(name)\n\
     );",
    "INSERT INTO milestone(name,due,started,completed,description) \
     SELECT name,due,0,completed,description FROM milestone_old;",
];
